use std::collections::HashMap;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use pgx_plan::domain::{CallerStrategy, GeneKey, RunToken, StageKind};
use pgx_plan::error::PlanError;
use pgx_plan::layout::RunLayout;
use pgx_plan::planner::{GenePlan, PipelinePlan, Topology, plan_gene};
use pgx_plan::submit::{self, SubmissionScript, job_name};

const GENES: [&str; 5] = ["cyp2d6", "cyp2b6", "cyp2c19", "slco1b1", "tpmt"];

fn layout() -> RunLayout {
    RunLayout::new(Utf8PathBuf::from("/scratch/runs/p1"))
}

fn token() -> RunToken {
    "aTOKEN".parse().unwrap()
}

fn mixed_plan(gene_count: usize) -> PipelinePlan {
    let layout = layout();
    let genes = GENES[..gene_count]
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let gene: GeneKey = name.parse().unwrap();
            let caller = if idx % 2 == 0 {
                CallerStrategy::Direct
            } else {
                CallerStrategy::Staged
            };
            let stages = plan_gene(&gene, caller, idx % 3 != 0, &layout);
            GenePlan { gene, stages }
        })
        .collect();
    PipelinePlan {
        run_root: layout.root().to_path_buf(),
        token: token(),
        caller: CallerStrategy::Direct,
        topology: Topology::Direct,
        genes,
    }
}

fn assert_holds_are_sound(script: &SubmissionScript) {
    let mut position = HashMap::new();
    for (idx, job) in script.jobs.iter().enumerate() {
        assert!(position.insert(job.name.clone(), idx).is_none(), "{}", job.name);
    }
    for (idx, job) in script.jobs.iter().enumerate() {
        for hold in &job.holds {
            let earlier = position.get(hold).copied();
            assert!(
                earlier.map(|pos| pos < idx).unwrap_or(false),
                "{} holds on {hold}",
                job.name
            );
        }
    }
}

#[test]
fn holds_are_sound_for_mixed_plans() {
    for gene_count in [1, 2, 5] {
        let plan = mixed_plan(gene_count);
        let script = submit::compile(&plan, &layout(), None).unwrap();
        assert_eq!(script.jobs.len(), plan.stage_count());
        assert_holds_are_sound(&script);

        for job in &script.jobs {
            if job.stage.kind == StageKind::GenotypeInfer {
                assert!(!job.holds.is_empty());
            } else {
                assert!(job.holds.is_empty(), "{}", job.name);
            }
        }
    }
}

#[test]
fn hold_list_matches_predecessors() {
    let plan = mixed_plan(5);
    let script = submit::compile(&plan, &layout(), None).unwrap();

    for stage in plan.stages() {
        let job = script.job(&job_name(&plan.token, &stage.id)).unwrap();
        assert_eq!(job.holds.is_empty(), stage.is_root(), "{}", stage.id);
        let expected = stage
            .predecessors
            .iter()
            .map(|pred| job_name(&plan.token, pred))
            .collect::<Vec<_>>();
        assert_eq!(job.holds, expected);
    }
}

#[test]
fn compile_is_deterministic_for_fixed_token() {
    let genes = ["cyp2d6", "cyp2b6"]
        .iter()
        .map(|name| name.parse::<GeneKey>().unwrap())
        .collect::<Vec<_>>();
    let first = PipelinePlan::build(&layout(), token(), &genes, CallerStrategy::Direct, true);
    let second = PipelinePlan::build(&layout(), token(), &genes, CallerStrategy::Direct, true);

    let first = submit::compile(&first, &layout(), Some("-l h_vmem=4G")).unwrap();
    let second = submit::compile(&second, &layout(), Some("-l h_vmem=4G")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn script_groups_jobs_by_gene() {
    let genes = ["cyp2d6", "cyp2b6"]
        .iter()
        .map(|name| name.parse::<GeneKey>().unwrap())
        .collect::<Vec<_>>();
    let plan = PipelinePlan::build(&layout(), token(), &genes, CallerStrategy::Direct, false);
    let script = submit::compile(&plan, &layout(), None).unwrap();

    assert!(script.text.starts_with("#!/bin/bash\n"));
    let headers = script
        .text
        .lines()
        .filter(|line| line.starts_with('#') && !line.starts_with("#!"))
        .collect::<Vec<_>>();
    assert_eq!(headers, vec!["# cyp2d6", "# cyp2b6"]);
    assert_eq!(
        script.text.lines().filter(|line| line.starts_with("qsub ")).count(),
        4
    );
}

#[test]
fn dangling_predecessor_is_rejected() {
    let mut plan = mixed_plan(1);
    plan.genes[0].stages.retain(|stage| stage.kind() == StageKind::GenotypeInfer);

    let err = submit::compile(&plan, &layout(), None).unwrap_err();
    assert_matches!(err, PlanError::DanglingPredecessor { .. });
}

#[test]
fn repeated_gene_is_a_duplicate_job() {
    let mut plan = mixed_plan(1);
    let copy = plan.genes[0].clone();
    plan.genes.push(copy);

    let err = submit::compile(&plan, &layout(), None).unwrap_err();
    assert_matches!(err, PlanError::DuplicateJobName(name) if name.starts_with("aTOKEN-cyp2d6-"));
}
