use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{GeneKey, GenomeBuild};
use crate::error::PlanError;

const BUILTIN_GENE_TABLE: &str = include_str!("../resources/gene_table.tsv");

pub const ALL_GENES: &str = "ALL";

static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(chr)?([0-9]{1,2}|X|Y|M|MT):[0-9]+-[0-9]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneType {
    Target,
    Control,
    Paralog,
}

impl fmt::Display for GeneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneType::Target => write!(f, "target"),
            GeneType::Control => write!(f, "control"),
            GeneType::Paralog => write!(f, "paralog"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneEntry {
    pub name: GeneKey,
    pub gene_type: GeneType,
    pub hg19_region: String,
    pub hg38_region: String,
}

impl GeneEntry {
    pub fn region(&self, build: GenomeBuild) -> &str {
        match build {
            GenomeBuild::Hg19 => &self.hg19_region,
            GenomeBuild::Hg38 => &self.hg38_region,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlGene {
    Gene(GeneKey),
    Region(String),
}

impl ControlGene {
    pub fn as_str(&self) -> &str {
        match self {
            ControlGene::Gene(gene) => gene.as_str(),
            ControlGene::Region(region) => region,
        }
    }
}

impl fmt::Display for ControlGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GeneCatalog {
    entries: Vec<GeneEntry>,
}

impl GeneCatalog {
    pub fn builtin() -> Result<Self, PlanError> {
        Self::parse(BUILTIN_GENE_TABLE)
    }

    pub fn from_path(path: &Utf8Path) -> Result<Self, PlanError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| PlanError::Filesystem(format!("read gene table {path}: {err}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PlanError> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line))
            .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'));

        let (header_line, header) = lines.next().ok_or(PlanError::CatalogParse {
            line: 0,
            message: "empty gene table".to_string(),
        })?;
        let columns = header.split('\t').map(str::trim).collect::<Vec<_>>();
        let column = |name: &str| {
            columns
                .iter()
                .position(|col| *col == name)
                .ok_or_else(|| PlanError::CatalogParse {
                    line: header_line,
                    message: format!("missing column {name}"),
                })
        };
        let i_name = column("name")?;
        let i_type = column("type")?;
        let i_hg19 = column("hg19_region")?;
        let i_hg38 = column("hg38_region")?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (line_no, line) in lines {
            let fields = line.split('\t').map(str::trim).collect::<Vec<_>>();
            let field = |idx: usize| {
                fields
                    .get(idx)
                    .copied()
                    .ok_or_else(|| PlanError::CatalogParse {
                        line: line_no,
                        message: format!("expected {} fields, found {}", columns.len(), fields.len()),
                    })
            };
            let raw_name = field(i_name)?;
            let name: GeneKey = raw_name.parse().map_err(|_| PlanError::CatalogParse {
                line: line_no,
                message: format!("invalid gene name {raw_name:?}"),
            })?;
            let gene_type = match field(i_type)? {
                "target" => GeneType::Target,
                "control" => GeneType::Control,
                "paralog" => GeneType::Paralog,
                other => {
                    return Err(PlanError::CatalogParse {
                        line: line_no,
                        message: format!("unknown gene type {other:?}"),
                    });
                }
            };
            let hg19_region = parse_region(field(i_hg19)?, line_no)?;
            let hg38_region = parse_region(field(i_hg38)?, line_no)?;
            if !seen.insert(name.clone()) {
                return Err(PlanError::CatalogParse {
                    line: line_no,
                    message: format!("duplicate gene {name}"),
                });
            }
            entries.push(GeneEntry {
                name,
                gene_type,
                hg19_region,
                hg38_region,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[GeneEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&GeneEntry> {
        self.entries.iter().find(|entry| entry.name.as_str() == name)
    }

    pub fn target_genes(&self) -> Vec<GeneKey> {
        self.entries
            .iter()
            .filter(|entry| entry.gene_type == GeneType::Target)
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn resolve_targets(&self, requested: &str) -> Result<Vec<GeneKey>, PlanError> {
        if requested.trim() == ALL_GENES {
            return Ok(self.target_genes());
        }

        let mut genes: Vec<GeneKey> = Vec::new();
        for token in requested.split(',') {
            let gene: GeneKey = token.parse()?;
            let is_target = self
                .get(gene.as_str())
                .map(|entry| entry.gene_type == GeneType::Target)
                .unwrap_or(false);
            if !is_target {
                return Err(PlanError::UnknownGene(gene.to_string()));
            }
            if genes.contains(&gene) {
                warn!(gene = %gene, "target gene requested more than once; keeping the first");
                continue;
            }
            genes.push(gene);
        }
        Ok(genes)
    }

    pub fn resolve_control(&self, raw: &str) -> Result<ControlGene, PlanError> {
        let trimmed = raw.trim();
        if REGION_RE.is_match(trimmed) {
            return Ok(ControlGene::Region(trimmed.to_string()));
        }
        let gene: GeneKey = trimmed
            .parse()
            .map_err(|_| PlanError::UnknownControl(trimmed.to_string()))?;
        match self.get(gene.as_str()) {
            Some(entry) => Ok(ControlGene::Gene(entry.name.clone())),
            None => Err(PlanError::UnknownControl(trimmed.to_string())),
        }
    }
}

fn parse_region(value: &str, line: usize) -> Result<String, PlanError> {
    if !REGION_RE.is_match(value) {
        return Err(PlanError::CatalogParse {
            line,
            message: format!("invalid region {value:?}"),
        });
    }
    Ok(value.to_string())
}
