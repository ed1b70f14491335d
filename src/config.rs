use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{CallerStrategy, DataType, GenomeBuild};
use crate::error::PlanError;
use crate::fs_util;
use crate::groups::{NONE, NormalizationGroups};
use crate::samples::{SampleSource, TagPolicy};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Section {
    #[serde(default)]
    pub bam_files: Option<Vec<String>>,
    #[serde(default)]
    pub bam_dir: Option<String>,
    #[serde(default)]
    pub bam_list: Option<String>,
    #[serde(default)]
    pub manifest: Option<String>,
    #[serde(default)]
    pub control_gene: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub dbsnp_file: Option<String>,
    #[serde(default)]
    pub fasta_file: Option<String>,
    #[serde(default)]
    pub gene_table: Option<String>,
    #[serde(default)]
    pub genome_build: Option<String>,
    #[serde(default)]
    pub java_options: Option<String>,
    #[serde(default)]
    pub plot: Option<bool>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub qsub_options: Option<String>,
    #[serde(default)]
    pub sample_list: Option<String>,
    #[serde(default)]
    pub snp_caller: Option<String>,
    #[serde(default)]
    pub target_genes: Option<String>,
    #[serde(default)]
    pub strict_sample_tags: Option<bool>,
    #[serde(default)]
    pub pypgx_tool: Option<String>,
    #[serde(default)]
    pub stargazer_tool: Option<String>,
}

impl Section {
    fn overlay(self, base: Section) -> Section {
        Section {
            bam_files: self.bam_files.or(base.bam_files),
            bam_dir: self.bam_dir.or(base.bam_dir),
            bam_list: self.bam_list.or(base.bam_list),
            manifest: self.manifest.or(base.manifest),
            control_gene: self.control_gene.or(base.control_gene),
            data_type: self.data_type.or(base.data_type),
            dbsnp_file: self.dbsnp_file.or(base.dbsnp_file),
            fasta_file: self.fasta_file.or(base.fasta_file),
            gene_table: self.gene_table.or(base.gene_table),
            genome_build: self.genome_build.or(base.genome_build),
            java_options: self.java_options.or(base.java_options),
            plot: self.plot.or(base.plot),
            project_path: self.project_path.or(base.project_path),
            qsub_options: self.qsub_options.or(base.qsub_options),
            sample_list: self.sample_list.or(base.sample_list),
            snp_caller: self.snp_caller.or(base.snp_caller),
            target_genes: self.target_genes.or(base.target_genes),
            strict_sample_tags: self.strict_sample_tags.or(base.strict_sample_tags),
            pypgx_tool: self.pypgx_tool.or(base.pypgx_tool),
            stargazer_tool: self.stargazer_tool.or(base.stargazer_tool),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub default: Section,
    #[serde(default)]
    pub user: Section,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolNames {
    pub pypgx: String,
    pub stargazer: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            pypgx: "pypgx".to_string(),
            stargazer: "stargazer".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub samples: SampleSource,
    pub tag_policy: TagPolicy,
    pub control_gene: Option<String>,
    pub data_type: DataType,
    pub dbsnp_file: Option<Utf8PathBuf>,
    pub fasta_file: Utf8PathBuf,
    pub gene_table: Option<Utf8PathBuf>,
    pub genome_build: GenomeBuild,
    pub java_options: Option<String>,
    pub plot: bool,
    pub project_path: Utf8PathBuf,
    pub qsub_options: Option<String>,
    pub groups: NormalizationGroups,
    pub caller: CallerStrategy,
    pub target_genes: String,
    pub tools: ToolNames,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: &Utf8Path) -> Result<PipelineSettings, PlanError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| PlanError::ConfigRead(path.to_path_buf()))?;
        let config: Config =
            toml::from_str(&content).map_err(|err| PlanError::ConfigParse(err.to_string()))?;
        let cwd = std::env::current_dir().map_err(|err| PlanError::Filesystem(err.to_string()))?;
        let config_path = fs_util::resolve_existing(&fs_util::to_utf8(cwd)?, path.as_str())?;
        let base = config_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("/"));
        Self::resolve_config(config, &base)
    }

    pub fn resolve_config(config: Config, base: &Utf8Path) -> Result<PipelineSettings, PlanError> {
        let section = config.user.overlay(config.default);

        let samples = resolve_sample_source(&section, base)?;
        let data_type = required(section.data_type, "data_type")?.parse()?;
        let genome_build = required(section.genome_build, "genome_build")?.parse()?;
        let caller = required(section.snp_caller, "snp_caller")?.parse()?;
        let fasta_file =
            fs_util::resolve_existing(base, &required(section.fasta_file, "fasta_file")?)?;
        let project_path =
            fs_util::resolve_new(base, &required(section.project_path, "project_path")?)?;
        let dbsnp_file = enabled(section.dbsnp_file)
            .map(|raw| fs_util::resolve_existing(base, &raw))
            .transpose()?;
        let gene_table = section
            .gene_table
            .map(|raw| fs_util::resolve_existing(base, &raw))
            .transpose()?;
        let groups = NormalizationGroups::parse(section.sample_list.as_deref().unwrap_or(NONE))?;
        let defaults = ToolNames::default();

        Ok(PipelineSettings {
            samples,
            tag_policy: if section.strict_sample_tags.unwrap_or(false) {
                TagPolicy::Strict
            } else {
                TagPolicy::FirstWins
            },
            control_gene: enabled(section.control_gene),
            data_type,
            dbsnp_file,
            fasta_file,
            gene_table,
            genome_build,
            java_options: enabled(section.java_options),
            plot: section.plot.unwrap_or(false),
            project_path,
            qsub_options: enabled(section.qsub_options),
            groups,
            caller,
            target_genes: section
                .target_genes
                .unwrap_or_else(|| crate::catalog::ALL_GENES.to_string()),
            tools: ToolNames {
                pypgx: section.pypgx_tool.unwrap_or(defaults.pypgx),
                stargazer: section.stargazer_tool.unwrap_or(defaults.stargazer),
            },
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, PlanError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(PlanError::MissingKey(key)),
    }
}

fn enabled(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != NONE)
}

fn resolve_sample_source(section: &Section, base: &Utf8Path) -> Result<SampleSource, PlanError> {
    let mut sources = Vec::new();
    if let Some(files) = section.bam_files.as_ref().filter(|files| !files.is_empty()) {
        let paths = files.iter().map(|file| base.join(file.trim())).collect();
        sources.push(("bam_files", SampleSource::Paths(paths)));
    }
    if let Some(dir) = enabled(section.bam_dir.clone()) {
        let dir = fs_util::resolve_existing(base, &dir)?;
        sources.push(("bam_dir", SampleSource::Directory(dir)));
    }
    if let Some(list) = enabled(section.bam_list.clone()) {
        let list = fs_util::resolve_existing(base, &list)?;
        sources.push(("bam_list", SampleSource::ListFile(list)));
    }
    if let Some(manifest) = enabled(section.manifest.clone()) {
        let manifest = fs_util::resolve_existing(base, &manifest)?;
        sources.push(("manifest", SampleSource::Manifest(manifest)));
    }

    match sources.len() {
        0 => Err(PlanError::NoInput),
        1 => Ok(sources.remove(0).1),
        _ => Err(PlanError::ConflictingInputs(
            sources
                .iter()
                .map(|(key, _)| *key)
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn user_section_overrides_default() {
        let user = Section {
            qsub_options: Some("-l mem_requested=2G".to_string()),
            ..Section::default()
        };
        let default = Section {
            qsub_options: Some("NONE".to_string()),
            target_genes: Some("ALL".to_string()),
            ..Section::default()
        };
        let merged = user.overlay(default);
        assert_eq!(merged.qsub_options.as_deref(), Some("-l mem_requested=2G"));
        assert_eq!(merged.target_genes.as_deref(), Some("ALL"));
    }

    #[test]
    fn none_sentinel_disables_value() {
        assert_eq!(enabled(Some(" NONE ".to_string())), None);
        assert_eq!(enabled(Some("vdr".to_string())), Some("vdr".to_string()));
    }

    #[test]
    fn missing_sample_source_is_no_input() {
        let err = resolve_sample_source(&Section::default(), Utf8Path::new("/")).unwrap_err();
        assert_matches!(err, PlanError::NoInput);
    }
}
