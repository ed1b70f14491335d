use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pgx_plan::app::{App, CompileOptions, CompileResult, GenesResult, list_genes};
use pgx_plan::config::ConfigLoader;
use pgx_plan::domain::{GenomeBuild, RunToken};
use pgx_plan::error::PlanError;
use pgx_plan::output::{JsonOutput, OutputMode, StderrProgress};
use pgx_plan::samtools::SystemSamtools;

#[derive(Parser)]
#[command(name = "pgx-plan")]
#[command(about = "Compile a cluster genotyping pipeline into stage scripts and an SGE submission script")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Compile a configuration file into a run root")]
    Compile(CompileArgs),
    #[command(about = "List the genes of the catalog")]
    Genes(GenesArgs),
}

#[derive(Args)]
struct CompileArgs {
    conf_file: Utf8PathBuf,

    #[arg(long, help = "Job-name prefix to use instead of a random one")]
    token: Option<String>,

    #[arg(long, help = "Render and compile everything without writing files")]
    dry_run: bool,
}

#[derive(Args)]
struct GenesArgs {
    #[arg(long)]
    gene_table: Option<Utf8PathBuf>,

    #[arg(long, value_enum, default_value_t = GenomeBuild::Hg19)]
    build: GenomeBuild,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PlanError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PlanError) -> u8 {
    match error {
        PlanError::RunRootExists(_) => 4,
        PlanError::MissingTool(_) | PlanError::SampleTag(_) => 3,
        PlanError::NoInput
        | PlanError::ConflictingInputs(_)
        | PlanError::MissingSampleTag(_)
        | PlanError::AmbiguousSampleTag { .. }
        | PlanError::DuplicateSample { .. }
        | PlanError::InvalidSampleId(_)
        | PlanError::UnknownGene(_)
        | PlanError::UnknownControl(_)
        | PlanError::MalformedGroup(_)
        | PlanError::UnknownCaller(_)
        | PlanError::InvalidGenomeBuild(_)
        | PlanError::InvalidDataType(_)
        | PlanError::InvalidRunToken(_)
        | PlanError::MissingInput(_)
        | PlanError::ConfigRead(_)
        | PlanError::ConfigParse(_)
        | PlanError::MissingKey(_)
        | PlanError::InvalidValue { .. }
        | PlanError::CatalogParse { .. }
        | PlanError::Manifest(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Compile(args) => run_compile(args, output_mode),
        Commands::Genes(args) => run_genes(args, output_mode),
    }
}

fn run_compile(args: CompileArgs, output_mode: OutputMode) -> miette::Result<()> {
    let settings = ConfigLoader::resolve(&args.conf_file)?;
    let token = args
        .token
        .as_deref()
        .map(str::parse::<RunToken>)
        .transpose()?;

    let samtools = SystemSamtools::new();
    debug!(samtools = ?samtools.tool_info().samtools, "sample tag reader");
    let app = App::new(samtools);
    let options = CompileOptions {
        token,
        dry_run: args.dry_run,
    };

    match output_mode {
        OutputMode::Json => {
            let result = app.compile(&settings, options, &JsonOutput)?;
            JsonOutput::print_compile(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.compile(&settings, options, &StderrProgress)?;
            print_compile_summary(&result);
        }
    }
    Ok(())
}

fn run_genes(args: GenesArgs, output_mode: OutputMode) -> miette::Result<()> {
    let result = list_genes(args.gene_table.as_ref(), args.build)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_genes(&result).into_diagnostic()?,
        OutputMode::Human => print_genes(&result),
    }
    Ok(())
}

fn print_compile_summary(result: &CompileResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}pgx-plan summary{reset}");
    println!("{green}run root: {}{reset}", result.run_root);
    println!("{green}token: {}  caller: {}  samples: {}{reset}", result.token, result.caller, result.samples);
    if let Some(control) = &result.control_gene {
        println!("{green}control gene: {control}{reset}");
    }
    for warning in &result.warnings {
        println!("{yellow}warning: {warning:?}{reset}");
    }

    for gene in &result.genes {
        println!("{cyan}{} ({}){reset}", gene.gene, gene.region);
        for job in &gene.jobs {
            if job.holds.is_empty() {
                println!("  {}", job.job_name);
            } else {
                println!("  {} <- {}", job.job_name, job.holds.join(", "));
            }
        }
    }

    match &result.script {
        Some(script) => {
            println!("{yellow}dry run: nothing written{reset}");
            print!("{script}");
        }
        None => println!("{green}submit with: sh {}{reset}", result.submission_script),
    }
}

fn print_genes(result: &GenesResult) {
    println!("# {}", result.genome_build);
    for gene in &result.genes {
        println!("{}\t{}\t{}", gene.name, gene.gene_type, gene.region);
    }
}
