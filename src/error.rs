use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error("no input BAM files found")]
    NoInput,

    #[error("more than one sample source configured: {0}")]
    ConflictingInputs(String),

    #[error("SM tag not found: {0}")]
    MissingSampleTag(Utf8PathBuf),

    #[error("multiple SM tags found in {path}: {}", tags.join(", "))]
    AmbiguousSampleTag { path: Utf8PathBuf, tags: Vec<String> },

    #[error("sample {sample} is provided by both {first} and {second}")]
    DuplicateSample {
        sample: String,
        first: Utf8PathBuf,
        second: Utf8PathBuf,
    },

    #[error("invalid sample identifier: {0:?}")]
    InvalidSampleId(String),

    #[error("unrecognized target gene: {0}")]
    UnknownGene(String),

    #[error("unrecognized control gene or region: {0}")]
    UnknownControl(String),

    #[error("malformed normalization group: {0:?}")]
    MalformedGroup(String),

    #[error("unrecognized SNP caller: {0} (expected 'bcftools' or 'gatk')")]
    UnknownCaller(String),

    #[error("invalid genome build: {0} (expected 'hg19' or 'hg38')")]
    InvalidGenomeBuild(String),

    #[error("invalid data type: {0} (expected 'wgs' or 'ts')")]
    InvalidDataType(String),

    #[error("invalid run token: {0:?}")]
    InvalidRunToken(String),

    #[error("run root already exists: {0}")]
    RunRootExists(Utf8PathBuf),

    #[error("required input not found: {0}")]
    MissingInput(String),

    #[error("path is not absolute: {0}")]
    RelativePath(String),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("template {template} references unknown placeholder `{placeholder}`")]
    UnknownPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("stage {stage} depends on {predecessor}, which is not planned before it")]
    DanglingPredecessor { stage: String, predecessor: String },

    #[error("stages of gene {0} form a dependency cycle")]
    DependencyCycle(String),

    #[error("job name {0} is defined more than once")]
    DuplicateJobName(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse TOML config: {0}")]
    ConfigParse(String),

    #[error("missing required config key: {0}")]
    MissingKey(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("gene table line {line}: {message}")]
    CatalogParse { line: usize, message: String },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("sample tag extraction failed: {0}")]
    SampleTag(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
