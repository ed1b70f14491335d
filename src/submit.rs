use std::collections::HashSet;
use std::fmt::Write as _;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::domain::RunToken;
use crate::error::PlanError;
use crate::layout::RunLayout;
use crate::planner::{PipelinePlan, StageId};
use crate::template::shell_word;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEntry {
    pub stage: StageId,
    pub name: String,
    pub holds: Vec<String>,
    pub script: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionScript {
    pub jobs: Vec<JobEntry>,
    pub text: String,
}

impl SubmissionScript {
    pub fn job(&self, name: &str) -> Option<&JobEntry> {
        self.jobs.iter().find(|job| job.name == name)
    }
}

pub fn job_name(token: &RunToken, stage: &StageId) -> String {
    format!("{token}-{}-{}", stage.gene, stage.kind)
}

pub fn compile(
    plan: &PipelinePlan,
    layout: &RunLayout,
    qsub_options: Option<&str>,
) -> Result<SubmissionScript, PlanError> {
    plan.validate()?;

    let mut defined = HashSet::new();
    let mut jobs = Vec::with_capacity(plan.stage_count());
    let mut text = String::from("#!/bin/bash\n");

    for gene_plan in &plan.genes {
        let log_dir = shell_word(layout.log_dir(&gene_plan.gene).as_str());
        let _ = write!(text, "\n# {}\n", gene_plan.gene);

        for stage in gene_plan.topological_order()? {
            let name = job_name(&plan.token, &stage.id);
            let mut holds = Vec::with_capacity(stage.predecessors.len());
            for pred in &stage.predecessors {
                let pred_name = job_name(&plan.token, pred);
                if !defined.contains(&pred_name) {
                    return Err(PlanError::DanglingPredecessor {
                        stage: stage.id.to_string(),
                        predecessor: pred.to_string(),
                    });
                }
                if !holds.contains(&pred_name) {
                    holds.push(pred_name);
                }
            }
            if !defined.insert(name.clone()) {
                return Err(PlanError::DuplicateJobName(name));
            }

            let mut line = format!("qsub -e {log_dir} -o {log_dir}");
            if let Some(options) = qsub_options {
                let _ = write!(line, " {options}");
            }
            if !stage.is_root() {
                let _ = write!(line, " -hold_jid {}", holds.join(","));
            }
            let _ = write!(line, " -N {name} {}", shell_word(stage.script.as_str()));
            text.push_str(&line);
            text.push('\n');

            jobs.push(JobEntry {
                stage: stage.id.clone(),
                name,
                holds,
                script: stage.script.clone(),
            });
        }
    }

    Ok(SubmissionScript { jobs, text })
}
