use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8Path;
use serde::Serialize;

use crate::error::PlanError;

pub trait SampleTagReader {
    fn sample_tags(&self, bam: &Utf8Path) -> Result<Vec<String>, PlanError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub samtools: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SystemSamtools {
    samtools: Option<PathBuf>,
}

impl SystemSamtools {
    pub fn new() -> Self {
        Self {
            samtools: find_in_path("samtools"),
        }
    }

    pub fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            samtools: self
                .samtools
                .as_ref()
                .and_then(|path| tool_version(path, &["--version"])),
        }
    }

    fn require_samtools(&self) -> Result<&PathBuf, PlanError> {
        self.samtools
            .as_ref()
            .ok_or_else(|| PlanError::MissingTool("samtools".to_string()))
    }
}

impl Default for SystemSamtools {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleTagReader for SystemSamtools {
    fn sample_tags(&self, bam: &Utf8Path) -> Result<Vec<String>, PlanError> {
        let samtools = self.require_samtools()?;
        let output = Command::new(samtools)
            .args(["view", "-H"])
            .arg(bam.as_std_path())
            .output()
            .map_err(|err| PlanError::SampleTag(format!("{}: {err}", samtools.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("samtools view -H {bam} failed")
            } else {
                stderr
            };
            return Err(PlanError::SampleTag(message));
        }
        Ok(parse_sm_tags(&String::from_utf8_lossy(&output.stdout)))
    }
}

pub fn parse_sm_tags(header: &str) -> Vec<String> {
    let mut tags = header
        .lines()
        .filter(|line| line.starts_with("@RG\t"))
        .flat_map(|line| line.split('\t').skip(1))
        .filter_map(|field| field.strip_prefix("SM:"))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    tags.sort();
    tags.dedup();
    tags
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sm_tags_come_from_read_groups_only() {
        let header = "@HD\tVN:1.6\tSO:coordinate\n\
            @SQ\tSN:chr22\tLN:50818468\n\
            @RG\tID:lane1\tSM:NA12878\tPL:ILLUMINA\n\
            @RG\tID:lane2\tSM:NA12878\n\
            @PG\tID:bwa\tCL:bwa mem SM:fake\n";
        assert_eq!(parse_sm_tags(header), vec!["NA12878".to_string()]);
    }

    #[test]
    fn multiple_sm_tags_are_sorted() {
        let header = "@RG\tID:a\tSM:S2\n@RG\tID:b\tSM:S1\n";
        assert_eq!(parse_sm_tags(header), vec!["S1".to_string(), "S2".to_string()]);
    }
}
