use std::collections::HashMap;
use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use pgx_plan::app::{App, CompileOptions, list_genes};
use pgx_plan::catalog::GeneType;
use pgx_plan::config::{PipelineSettings, ToolNames};
use pgx_plan::domain::{CallerStrategy, DataType, GenomeBuild, RunToken};
use pgx_plan::error::PlanError;
use pgx_plan::groups::NormalizationGroups;
use pgx_plan::output::JsonOutput;
use pgx_plan::planner::Topology;
use pgx_plan::samples::{SampleSource, TagPolicy};
use pgx_plan::samtools::SampleTagReader;

#[derive(Default, Clone)]
struct MockTags {
    tags: HashMap<String, String>,
}

impl SampleTagReader for MockTags {
    fn sample_tags(&self, bam: &Utf8Path) -> Result<Vec<String>, PlanError> {
        let name = bam.file_name().unwrap_or_default();
        Ok(self.tags.get(name).cloned().into_iter().collect())
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    root: Utf8PathBuf,
    bams: Vec<Utf8PathBuf>,
}

impl Fixture {
    fn new() -> (Self, MockTags) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().canonicalize().unwrap()).unwrap();
        fs::write(root.join("hs37d5.fa").as_std_path(), b">22\n").unwrap();
        let mut tags = MockTags::default();
        let mut bams = Vec::new();
        for (file, sample) in [("a.bam", "S3"), ("b.bam", "S2"), ("c.bam", "S1")] {
            let path = root.join(file);
            fs::write(path.as_std_path(), b"").unwrap();
            tags.tags.insert(file.to_string(), sample.to_string());
            bams.push(path);
        }
        (
            Self {
                _temp: temp,
                root,
                bams,
            },
            tags,
        )
    }

    fn run_root(&self) -> Utf8PathBuf {
        self.root.join("project")
    }

    fn settings(&self, caller: CallerStrategy, control_gene: Option<&str>) -> PipelineSettings {
        PipelineSettings {
            samples: SampleSource::Paths(self.bams.clone()),
            tag_policy: TagPolicy::FirstWins,
            control_gene: control_gene.map(str::to_string),
            data_type: DataType::Wgs,
            dbsnp_file: None,
            fasta_file: self.root.join("hs37d5.fa"),
            gene_table: None,
            genome_build: GenomeBuild::Hg19,
            java_options: None,
            plot: false,
            project_path: self.run_root(),
            qsub_options: None,
            groups: NormalizationGroups::default(),
            caller,
            target_genes: "cyp2d6".to_string(),
            tools: ToolNames::default(),
        }
    }
}

fn options(dry_run: bool) -> CompileOptions {
    CompileOptions {
        token: Some("aTOKEN".parse().unwrap()),
        dry_run,
    }
}

fn read(path: &Utf8Path) -> String {
    fs::read_to_string(path.as_std_path()).unwrap()
}

#[test]
fn compile_writes_complete_run_root() {
    let (fixture, tags) = Fixture::new();
    let settings = fixture.settings(CallerStrategy::Direct, Some("vdr"));
    let app = App::new(tags);

    let result = app.compile(&settings, options(false), &JsonOutput).unwrap();

    let root = fixture.run_root();
    let shell = root.join("gene/cyp2d6/shell");
    assert_eq!(result.topology, Topology::DirectWithDepth);
    assert_eq!(result.samples, 3);
    assert!(root.join("gene/cyp2d6/log").is_dir());
    for script in ["depth-profile.sh", "call-variants-direct.sh", "genotype-infer.sh"] {
        assert!(shell.join(script).is_file(), "{script}");
    }

    let bam_list = read(&root.join("bam-list.txt"));
    let expected = ["c.bam", "b.bam", "a.bam"]
        .iter()
        .map(|file| format!("{}\n", fixture.root.join(file)))
        .collect::<String>();
    assert_eq!(bam_list, expected);

    let depth = read(&shell.join("depth-profile.sh"));
    assert!(depth.starts_with("#!/bin/bash\n\npypgx bam2gdf \\\n  hg19 \\\n  cyp2d6 \\\n  vdr \\\n"));
    assert!(depth.ends_with(&format!("  {}\n", fixture.root.join("a.bam"))));

    let genotype = read(&shell.join("genotype-infer.sh"));
    assert!(genotype.contains("stargazer \\\n  wgs \\\n  hg19 \\\n  cyp2d6 \\\n"));
    assert!(genotype.contains(&format!("{}/gene/cyp2d6/pypgx.vcf", root)));
    assert!(genotype.contains("  --cg vdr \\\n"));
    assert!(genotype.ends_with(&format!("  --gdf {}/gene/cyp2d6/pypgx.gdf\n", root)));

    let submission = read(&root.join("example-qsub.sh"));
    let qsub = submission
        .lines()
        .filter(|line| line.starts_with("qsub "))
        .collect::<Vec<_>>();
    assert_eq!(qsub.len(), 3);
    assert!(qsub[2].contains(
        "-hold_jid aTOKEN-cyp2d6-depth-profile,aTOKEN-cyp2d6-call-variants-direct -N aTOKEN-cyp2d6-genotype-infer"
    ));

    let manifest: serde_json::Value = serde_json::from_str(&read(&root.join("plan.json"))).unwrap();
    assert_eq!(manifest["token"], "aTOKEN");
    assert_eq!(manifest["topology"], "direct-with-depth");
    assert_eq!(manifest["run_root"], root.as_str());
    assert_eq!(
        manifest["genes"][0]["jobs"][0]["script"],
        shell.join("depth-profile.sh").as_str()
    );
    assert!(manifest["compiled_at"].is_string());
}

#[test]
fn staged_caller_writes_job_description() {
    let (fixture, tags) = Fixture::new();
    let settings = fixture.settings(CallerStrategy::Staged, None);
    let app = App::new(tags);

    let result = app.compile(&settings, options(false), &JsonOutput).unwrap();

    let gene_dir = fixture.run_root().join("gene/cyp2d6");
    assert_eq!(result.topology, Topology::Staged);
    assert!(!gene_dir.join("shell/depth-profile.sh").exists());
    let conf = read(&gene_dir.join("conf.txt"));
    assert!(conf.contains("target_gene = cyp2d6\n"));
    assert!(conf.contains(&format!("project_path = {gene_dir}/bam2vcf2\n")));
    assert!(conf.contains("dbsnp_file = NONE\n"));
    let caller = read(&gene_dir.join("shell/call-variants-staged.sh"));
    assert_eq!(
        caller,
        format!("#!/bin/bash\n\npypgx bam2vcf2 {gene_dir}/conf.txt\n")
    );
}

#[test]
fn unknown_gene_leaves_no_run_root() {
    let (fixture, tags) = Fixture::new();
    let mut settings = fixture.settings(CallerStrategy::Direct, None);
    settings.target_genes = "cyp2d6,cyp2dx".to_string();
    let app = App::new(tags);

    let err = app.compile(&settings, options(false), &JsonOutput).unwrap_err();

    assert_matches!(err, PlanError::UnknownGene(gene) if gene == "cyp2dx");
    assert!(!fixture.run_root().exists());
}

#[test]
fn unknown_control_leaves_no_run_root() {
    let (fixture, tags) = Fixture::new();
    let settings = fixture.settings(CallerStrategy::Direct, Some("notagene"));
    let app = App::new(tags);

    let err = app.compile(&settings, options(false), &JsonOutput).unwrap_err();

    assert_matches!(err, PlanError::UnknownControl(_));
    assert!(!fixture.run_root().exists());
}

#[test]
fn existing_run_root_is_left_untouched() {
    let (fixture, tags) = Fixture::new();
    let root = fixture.run_root();
    fs::create_dir(root.as_std_path()).unwrap();
    fs::write(root.join("keep.txt").as_std_path(), b"previous run").unwrap();
    let settings = fixture.settings(CallerStrategy::Direct, None);
    let app = App::new(tags);

    let err = app.compile(&settings, options(false), &JsonOutput).unwrap_err();

    assert_matches!(err, PlanError::RunRootExists(path) if path == root);
    let entries = fs::read_dir(root.as_std_path()).unwrap().count();
    assert_eq!(entries, 1);
    assert_eq!(read(&root.join("keep.txt")), "previous run");
}

#[test]
fn dry_run_writes_nothing() {
    let (fixture, tags) = Fixture::new();
    let settings = fixture.settings(CallerStrategy::Direct, Some("vdr"));
    let app = App::new(tags);

    let result = app.compile(&settings, options(true), &JsonOutput).unwrap();

    assert!(result.dry_run);
    let script = result.script.unwrap();
    assert!(script.contains("-N aTOKEN-cyp2d6-depth-profile"));
    assert!(!fixture.run_root().exists());
}

#[test]
fn fixed_token_gives_identical_scripts() {
    let (fixture, tags) = Fixture::new();
    let mut settings = fixture.settings(CallerStrategy::Direct, Some("vdr"));
    settings.target_genes = "cyp2d6,cyp2b6".to_string();

    let one = App::new(tags.clone())
        .compile(&settings, options(true), &JsonOutput)
        .unwrap();
    let two = App::new(tags)
        .compile(&settings, options(true), &JsonOutput)
        .unwrap();

    assert_eq!(one.script, two.script);
    assert_eq!(one.genes.len(), 2);
}

#[test]
fn generated_token_prefixes_every_job() {
    let (fixture, tags) = Fixture::new();
    let settings = fixture.settings(CallerStrategy::Direct, None);
    let app = App::new(tags);

    let result = app
        .compile(&settings, CompileOptions::default(), &JsonOutput)
        .unwrap();

    let token: RunToken = result.token.as_str().parse().unwrap();
    let prefix = format!("{token}-cyp2d6-");
    assert!(
        result.genes[0]
            .jobs
            .iter()
            .all(|job| job.job_name.starts_with(&prefix))
    );
    assert!(fixture.run_root().join("example-qsub.sh").is_file());
}

#[test]
fn normalization_group_is_forwarded_to_genotype_stage() {
    let (fixture, tags) = Fixture::new();
    let mut settings = fixture.settings(CallerStrategy::Direct, None);
    settings.groups = NormalizationGroups::parse("cyp2d6, S1, S2").unwrap();
    let app = App::new(tags);

    app.compile(&settings, options(false), &JsonOutput).unwrap();

    let genotype = read(&fixture.run_root().join("gene/cyp2d6/shell/genotype-infer.sh"));
    assert!(genotype.ends_with("  --sl S1 S2\n"));
    assert!(!genotype.contains("--cg"));
}

#[test]
fn list_genes_reports_build_regions() {
    let result = list_genes(None, GenomeBuild::Hg38).unwrap();

    let cyp2d6 = result
        .genes
        .iter()
        .find(|gene| gene.name.as_str() == "cyp2d6")
        .unwrap();
    assert_eq!(cyp2d6.gene_type, GeneType::Target);
    assert_eq!(cyp2d6.region, "chr22:42116498-42155810");
}
