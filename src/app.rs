use camino::Utf8PathBuf;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::catalog::{ControlGene, GeneCatalog, GeneType};
use crate::config::PipelineSettings;
use crate::domain::{CallerStrategy, GeneKey, GenomeBuild, RunToken, StageKind};
use crate::error::PlanError;
use crate::fs_util;
use crate::layout::RunLayout;
use crate::materialize::{self, ScriptContext};
use crate::planner::{PipelinePlan, Topology};
use crate::samples::{SampleRegistry, SampleWarning};
use crate::samtools::SampleTagReader;
use crate::submit::{self, SubmissionScript};

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub token: Option<RunToken>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileResult {
    pub run_root: Utf8PathBuf,
    pub token: RunToken,
    pub caller: CallerStrategy,
    pub topology: Topology,
    pub control_gene: Option<ControlGene>,
    pub samples: usize,
    pub genes: Vec<GeneResult>,
    pub warnings: Vec<SampleWarning>,
    pub submission_script: Utf8PathBuf,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneResult {
    pub gene: GeneKey,
    pub region: String,
    pub jobs: Vec<JobResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub stage: StageKind,
    pub job_name: String,
    pub holds: Vec<String>,
    pub script: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize)]
struct PlanManifest<'a> {
    compiled_at: String,
    tool_version: &'static str,
    #[serde(flatten)]
    result: &'a CompileResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenesResult {
    pub genome_build: GenomeBuild,
    pub genes: Vec<GeneListing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneListing {
    pub name: GeneKey,
    pub gene_type: GeneType,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent { message });
}

#[derive(Clone)]
pub struct App<T: SampleTagReader> {
    tags: T,
}

impl<T: SampleTagReader> App<T> {
    pub fn new(tags: T) -> Self {
        Self { tags }
    }

    /// The submission script is written last, so its absence marks an
    /// incomplete run.
    pub fn compile(
        &self,
        settings: &PipelineSettings,
        options: CompileOptions,
        sink: &dyn ProgressSink,
    ) -> Result<CompileResult, PlanError> {
        emit(sink, "phase=Resolve; genes and control".to_string());
        let catalog = load_catalog(settings.gene_table.as_ref())?;
        let genes = catalog.resolve_targets(&settings.target_genes)?;
        let control = settings
            .control_gene
            .as_deref()
            .map(|raw| catalog.resolve_control(raw))
            .transpose()?;

        let layout = RunLayout::new(settings.project_path.clone());
        if layout.root().as_std_path().exists() {
            return Err(PlanError::RunRootExists(layout.root().to_path_buf()));
        }

        emit(sink, "phase=Resolve; samples".to_string());
        let samples = SampleRegistry::resolve(&settings.samples, &self.tags, settings.tag_policy)?;

        let token = options.token.unwrap_or_else(RunToken::generate);
        emit(sink, format!("phase=Plan; token={token}"));
        let plan = PipelinePlan::build(
            &layout,
            token,
            &genes,
            settings.caller,
            control.is_some(),
        );
        info!(
            genes = plan.genes.len(),
            stages = plan.stage_count(),
            samples = samples.len(),
            token = %plan.token,
            "planned pipeline"
        );

        emit(sink, "phase=Render; stage scripts".to_string());
        let ctx = ScriptContext {
            layout: &layout,
            settings,
            samples: &samples,
            control: control.as_ref(),
        };
        let rendered = materialize::render_run(&plan, &ctx)?;
        let submission = submit::compile(&plan, &layout, settings.qsub_options.as_deref())?;

        let result = build_result(
            &plan,
            &catalog,
            settings,
            control,
            &samples,
            &submission,
            &layout,
            options.dry_run,
        );

        if options.dry_run {
            emit(sink, "phase=Done; dry run, nothing written".to_string());
            return Ok(result);
        }

        emit(sink, format!("phase=Write; {}", layout.root()));
        materialize::write_run(&rendered)?;
        let manifest = PlanManifest {
            compiled_at: Utc::now().to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION"),
            result: &result,
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)
            .map_err(|err| PlanError::Filesystem(err.to_string()))?;
        fs_util::write_new_file(&layout.manifest_path(), &format!("{manifest_json}\n"))?;
        fs_util::write_new_file(&layout.submission_path(), &submission.text)?;
        info!(path = %layout.submission_path(), "wrote submission script");
        emit(sink, format!("phase=Done; {}", layout.submission_path()));

        Ok(result)
    }
}

pub fn list_genes(
    gene_table: Option<&Utf8PathBuf>,
    genome_build: GenomeBuild,
) -> Result<GenesResult, PlanError> {
    let catalog = load_catalog(gene_table)?;
    let genes = catalog
        .entries()
        .iter()
        .map(|entry| GeneListing {
            name: entry.name.clone(),
            gene_type: entry.gene_type,
            region: entry.region(genome_build).to_string(),
        })
        .collect();
    Ok(GenesResult {
        genome_build,
        genes,
    })
}

fn load_catalog(gene_table: Option<&Utf8PathBuf>) -> Result<GeneCatalog, PlanError> {
    match gene_table {
        Some(path) => GeneCatalog::from_path(path),
        None => GeneCatalog::builtin(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_result(
    plan: &PipelinePlan,
    catalog: &GeneCatalog,
    settings: &PipelineSettings,
    control: Option<ControlGene>,
    samples: &SampleRegistry,
    submission: &SubmissionScript,
    layout: &RunLayout,
    dry_run: bool,
) -> CompileResult {
    let genes = plan
        .genes
        .iter()
        .map(|gene_plan| GeneResult {
            gene: gene_plan.gene.clone(),
            region: catalog
                .get(gene_plan.gene.as_str())
                .map(|entry| entry.region(settings.genome_build).to_string())
                .unwrap_or_default(),
            jobs: submission
                .jobs
                .iter()
                .filter(|job| job.stage.gene == gene_plan.gene)
                .map(|job| JobResult {
                    stage: job.stage.kind,
                    job_name: job.name.clone(),
                    holds: job.holds.clone(),
                    script: job.script.clone(),
                })
                .collect(),
        })
        .collect();

    CompileResult {
        run_root: plan.run_root.clone(),
        token: plan.token.clone(),
        caller: plan.caller,
        topology: plan.topology,
        control_gene: control,
        samples: samples.len(),
        genes,
        warnings: samples.warnings().to_vec(),
        submission_script: layout.submission_path(),
        dry_run,
        script: dry_run.then(|| submission.text.clone()),
    }
}
