use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::catalog::ControlGene;
use crate::config::PipelineSettings;
use crate::domain::{CallerStrategy, GeneKey, StageKind};
use crate::error::PlanError;
use crate::fs_util;
use crate::groups::NONE;
use crate::layout::RunLayout;
use crate::planner::{PipelinePlan, Stage};
use crate::samples::SampleRegistry;
use crate::template::{Template, Vars, shell_word};

pub const DEPTH_PROFILE: Template = Template::new(
    "depth-profile",
    "#!/bin/bash\n\
     \n\
     {pypgx} bam2gdf \\\n  \
     {genome_build} \\\n  \
     {gene} \\\n  \
     {control_gene} \\\n  \
     {gdf_file} \\\n\
     {bam_args}\n",
);

pub const CALL_VARIANTS_DIRECT: Template = Template::new(
    "call-variants-direct",
    "#!/bin/bash\n\
     \n\
     {pypgx} bam2vcf \\\n  \
     bcftools \\\n  \
     {fasta_file} \\\n  \
     {gene} \\\n  \
     {vcf_file} \\\n  \
     {genome_build} \\\n\
     {bam_args}\n",
);

pub const CALL_VARIANTS_STAGED: Template = Template::new(
    "call-variants-staged",
    "#!/bin/bash\n\
     \n\
     {pypgx} bam2vcf2 {conf_file}\n",
);

pub const GENOTYPE_INFER: Template = Template::new(
    "genotype-infer",
    "#!/bin/bash\n\
     \n\
     {stargazer} \\\n  \
     {data_type} \\\n  \
     {genome_build} \\\n  \
     {gene} \\\n  \
     {vcf_file} \\\n  \
     {output_dir}{extra_args}\n",
);

pub const STAGED_CONF: Template = Template::new(
    "staged-conf",
    "# Do not make any changes to this section.\n\
     [DEFAULT]\n\
     qsub_options = NONE\n\
     java_options = NONE\n\
     dbsnp_file = NONE\n\
     \n\
     # Make any necessary changes to this section.\n\
     [USER]\n\
     fasta_file = {fasta_file}\n\
     bam_list = {bam_list}\n\
     project_path = {project_path}\n\
     target_gene = {gene}\n\
     genome_build = {genome_build}\n\
     qsub_options = {qsub_options}\n\
     java_options = {java_options}\n\
     dbsnp_file = {dbsnp_file}\n",
);

pub fn template_for(kind: StageKind) -> Template {
    match kind {
        StageKind::DepthProfile => DEPTH_PROFILE,
        StageKind::CallVariantsDirect => CALL_VARIANTS_DIRECT,
        StageKind::CallVariantsStaged => CALL_VARIANTS_STAGED,
        StageKind::GenotypeInfer => GENOTYPE_INFER,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
    pub layout: &'a RunLayout,
    pub settings: &'a PipelineSettings,
    pub samples: &'a SampleRegistry,
    pub control: Option<&'a ControlGene>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: Utf8PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct RenderedRun {
    pub root: Utf8PathBuf,
    pub dirs: Vec<Utf8PathBuf>,
    pub files: Vec<RenderedFile>,
}

pub fn render_run(plan: &PipelinePlan, ctx: &ScriptContext<'_>) -> Result<RenderedRun, PlanError> {
    check_paths(ctx)?;

    let layout = ctx.layout;
    let mut dirs = vec![layout.genes_dir()];
    let mut files = vec![RenderedFile {
        path: layout.bam_list_path(),
        contents: ctx
            .samples
            .paths()
            .map(|path| format!("{path}\n"))
            .collect(),
    }];

    for gene_plan in &plan.genes {
        let gene = &gene_plan.gene;
        dirs.push(layout.gene_dir(gene));
        dirs.push(layout.shell_dir(gene));
        dirs.push(layout.log_dir(gene));

        for stage in &gene_plan.stages {
            if stage.kind() == StageKind::CallVariantsStaged {
                files.push(RenderedFile {
                    path: layout.staged_conf(gene),
                    contents: STAGED_CONF.render(&staged_conf_vars(gene, ctx))?,
                });
            }
            files.push(render_stage(stage, plan.caller, ctx)?);
        }
    }

    Ok(RenderedRun {
        root: layout.root().to_path_buf(),
        dirs,
        files,
    })
}

pub fn render_stage(
    stage: &Stage,
    caller: CallerStrategy,
    ctx: &ScriptContext<'_>,
) -> Result<RenderedFile, PlanError> {
    let vars = stage_vars(stage, caller, ctx)?;
    let contents = template_for(stage.kind()).render(&vars)?;
    Ok(RenderedFile {
        path: stage.script.clone(),
        contents,
    })
}

pub fn write_run(run: &RenderedRun) -> Result<(), PlanError> {
    create_run_root(&run.root)?;
    for dir in &run.dirs {
        fs_util::create_dir_new(dir)?;
    }
    for file in &run.files {
        fs_util::write_new_file(&file.path, &file.contents)?;
    }
    info!(root = %run.root, dirs = run.dirs.len(), files = run.files.len(), "materialized run root");
    Ok(())
}

fn create_run_root(root: &Utf8Path) -> Result<(), PlanError> {
    match fs::create_dir(root.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if fs_util::is_already_exists(&err) => {
            Err(PlanError::RunRootExists(root.to_path_buf()))
        }
        Err(err) => Err(PlanError::Filesystem(format!("create {root}: {err}"))),
    }
}

fn check_paths(ctx: &ScriptContext<'_>) -> Result<(), PlanError> {
    fs_util::ensure_absolute(ctx.layout.root())?;
    fs_util::ensure_absolute(&ctx.settings.fasta_file)?;
    if let Some(dbsnp) = &ctx.settings.dbsnp_file {
        fs_util::ensure_absolute(dbsnp)?;
    }
    for path in ctx.samples.paths() {
        fs_util::ensure_absolute(path)?;
    }
    Ok(())
}

fn bam_args(samples: &SampleRegistry) -> String {
    samples
        .paths()
        .map(|path| format!("  {}", shell_word(path.as_str())))
        .collect::<Vec<_>>()
        .join(" \\\n")
}

fn path_word(path: &Utf8Path) -> String {
    shell_word(path.as_str())
}

fn stage_vars(
    stage: &Stage,
    caller: CallerStrategy,
    ctx: &ScriptContext<'_>,
) -> Result<Vars, PlanError> {
    let gene = stage.gene();
    let layout = ctx.layout;
    let settings = ctx.settings;

    let mut vars = Vars::new();
    vars.insert("gene", gene.to_string());
    vars.insert("genome_build", settings.genome_build.to_string());

    match stage.kind() {
        StageKind::DepthProfile => {
            let control = ctx.control.ok_or_else(|| PlanError::InvalidValue {
                key: "control_gene",
                value: NONE.to_string(),
            })?;
            vars.insert("pypgx", shell_word(&settings.tools.pypgx));
            vars.insert("control_gene", control.to_string());
            vars.insert("gdf_file", path_word(&layout.gdf_path(gene)));
            vars.insert("bam_args", bam_args(ctx.samples));
        }
        StageKind::CallVariantsDirect => {
            vars.insert("pypgx", shell_word(&settings.tools.pypgx));
            vars.insert("fasta_file", path_word(&settings.fasta_file));
            vars.insert("vcf_file", path_word(&layout.vcf_path(gene, caller)));
            vars.insert("bam_args", bam_args(ctx.samples));
        }
        StageKind::CallVariantsStaged => {
            vars.insert("pypgx", shell_word(&settings.tools.pypgx));
            vars.insert("conf_file", path_word(&layout.staged_conf(gene)));
        }
        StageKind::GenotypeInfer => {
            vars.insert("stargazer", shell_word(&settings.tools.stargazer));
            vars.insert("data_type", settings.data_type.to_string());
            vars.insert("vcf_file", path_word(&layout.vcf_path(gene, caller)));
            vars.insert("output_dir", path_word(&layout.genotype_dir(gene)));
            vars.insert("extra_args", genotype_extra_args(gene, ctx));
        }
    }
    Ok(vars)
}

fn genotype_extra_args(gene: &GeneKey, ctx: &ScriptContext<'_>) -> String {
    let mut args = Vec::new();
    if let Some(control) = ctx.control {
        args.push(format!("--cg {control}"));
        args.push(format!("--gdf {}", path_word(&ctx.layout.gdf_path(gene))));
        if ctx.settings.plot {
            args.push("--plot".to_string());
        }
    }
    if let Some(samples) = ctx.settings.groups.get(gene) {
        let names = samples
            .iter()
            .map(|id| shell_word(id.as_str()))
            .collect::<Vec<_>>()
            .join(" ");
        args.push(format!("--sl {names}"));
    }
    args.iter().map(|arg| format!(" \\\n  {arg}")).collect()
}

fn staged_conf_vars(gene: &GeneKey, ctx: &ScriptContext<'_>) -> Vars {
    let settings = ctx.settings;
    let or_none = |value: Option<String>| value.unwrap_or_else(|| NONE.to_string());
    Vars::from([
        ("fasta_file", settings.fasta_file.to_string()),
        ("bam_list", ctx.layout.bam_list_path().to_string()),
        ("project_path", ctx.layout.staged_dir(gene).to_string()),
        ("gene", gene.to_string()),
        ("genome_build", settings.genome_build.to_string()),
        ("qsub_options", or_none(settings.qsub_options.clone())),
        ("java_options", or_none(settings.java_options.clone())),
        (
            "dbsnp_file",
            or_none(settings.dbsnp_file.as_ref().map(ToString::to_string)),
        ),
    ])
}
