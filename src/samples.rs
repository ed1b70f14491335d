use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::SampleId;
use crate::error::PlanError;
use crate::fs_util;
use crate::samtools::SampleTagReader;

const BAM_EXT: &str = "bam";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSource {
    Paths(Vec<Utf8PathBuf>),
    Directory(Utf8PathBuf),
    ListFile(Utf8PathBuf),
    Manifest(Utf8PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagPolicy {
    #[default]
    FirstWins,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleWarning {
    AmbiguousSampleTag {
        path: Utf8PathBuf,
        tags: Vec<String>,
        chosen: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SampleRegistry {
    samples: BTreeMap<SampleId, Utf8PathBuf>,
    warnings: Vec<SampleWarning>,
}

impl SampleRegistry {
    pub fn resolve(
        source: &SampleSource,
        reader: &dyn SampleTagReader,
        policy: TagPolicy,
    ) -> Result<Self, PlanError> {
        let mut registry = Self::default();

        if let SampleSource::Manifest(path) = source {
            for (id, bam) in read_manifest(path)? {
                registry.insert(id, bam)?;
            }
        } else {
            let paths = collect_paths(source)?;
            for path in paths {
                let tags = reader.sample_tags(&path)?;
                let chosen = match tags.as_slice() {
                    [] => return Err(PlanError::MissingSampleTag(path)),
                    [only] => only.clone(),
                    [first, ..] => {
                        if policy == TagPolicy::Strict {
                            return Err(PlanError::AmbiguousSampleTag { path, tags });
                        }
                        warn!(path = %path, tags = ?tags, chosen = %first, "multiple SM tags found; using the first");
                        let chosen = first.clone();
                        registry.warnings.push(SampleWarning::AmbiguousSampleTag {
                            path: path.clone(),
                            tags: tags.clone(),
                            chosen: chosen.clone(),
                        });
                        chosen
                    }
                };
                let id: SampleId = chosen.parse()?;
                registry.insert(id, path)?;
            }
        }

        if registry.is_empty() {
            return Err(PlanError::NoInput);
        }
        info!(samples = registry.samples.len(), "resolved samples");
        Ok(registry)
    }

    fn insert(&mut self, id: SampleId, path: Utf8PathBuf) -> Result<(), PlanError> {
        match self.samples.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(path);
                Ok(())
            }
            Entry::Occupied(existing) if existing.get() == &path => Ok(()),
            Entry::Occupied(existing) => Err(PlanError::DuplicateSample {
                sample: existing.key().to_string(),
                first: existing.get().clone(),
                second: path,
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SampleId, &Utf8PathBuf)> {
        self.samples.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.samples.values()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn warnings(&self) -> &[SampleWarning] {
        &self.warnings
    }
}

fn collect_paths(source: &SampleSource) -> Result<BTreeSet<Utf8PathBuf>, PlanError> {
    let raw = match source {
        SampleSource::Paths(paths) => paths.clone(),
        SampleSource::Directory(dir) => fs_util::find_files_with_ext(dir.as_std_path(), BAM_EXT)?
            .into_iter()
            .map(fs_util::to_utf8)
            .collect::<Result<Vec<_>, _>>()?,
        SampleSource::ListFile(list) => read_list_file(list)?,
        SampleSource::Manifest(_) => Vec::new(),
    };

    let root = Utf8Path::new("/");
    raw.iter()
        .map(|path| fs_util::resolve_existing(root, path.as_str()))
        .collect()
}

fn read_list_file(list: &Utf8Path) -> Result<Vec<Utf8PathBuf>, PlanError> {
    let content = fs::read_to_string(list.as_std_path())
        .map_err(|err| PlanError::MissingInput(format!("{list}: {err}")))?;
    let base = list.parent().unwrap_or(Utf8Path::new("/"));
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| base.join(line))
        .collect())
}

fn read_manifest(path: &Utf8Path) -> Result<Vec<(SampleId, Utf8PathBuf)>, PlanError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| PlanError::MissingInput(format!("{path}: {err}")))?;
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| PlanError::Manifest(format!("{path} is empty")))?
        .split('\t')
        .map(str::trim)
        .collect::<Vec<_>>();
    let column = |name: &str| {
        header
            .iter()
            .position(|col| *col == name)
            .ok_or_else(|| PlanError::Manifest(format!("{path}: missing column {name}")))
    };
    let i_sample = column("sample_id")?;
    let i_bam = column("bam")?;

    let base = path.parent().unwrap_or(Utf8Path::new("/"));
    let mut rows = Vec::new();
    for line in lines {
        let fields = line.split('\t').map(str::trim).collect::<Vec<_>>();
        let (Some(sample), Some(bam)) = (fields.get(i_sample), fields.get(i_bam)) else {
            return Err(PlanError::Manifest(format!("{path}: short row {line:?}")));
        };
        let id: SampleId = sample.parse()?;
        let bam = fs_util::resolve_existing(base, bam)?;
        rows.push((id, bam));
    }
    Ok(rows)
}
