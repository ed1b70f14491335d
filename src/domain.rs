use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GenomeBuild {
    Hg19,
    Hg38,
}

impl GenomeBuild {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenomeBuild::Hg19 => "hg19",
            GenomeBuild::Hg38 => "hg38",
        }
    }
}

impl fmt::Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GenomeBuild {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "hg19" => Ok(GenomeBuild::Hg19),
            "hg38" => Ok(GenomeBuild::Hg38),
            _ => Err(PlanError::InvalidGenomeBuild(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Wgs,
    Ts,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Wgs => write!(f, "wgs"),
            DataType::Ts => write!(f, "ts"),
        }
    }
}

impl FromStr for DataType {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "wgs" => Ok(DataType::Wgs),
            "ts" => Ok(DataType::Ts),
            _ => Err(PlanError::InvalidDataType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerStrategy {
    Direct,
    Staged,
}

impl CallerStrategy {
    pub fn caller_name(&self) -> &'static str {
        match self {
            CallerStrategy::Direct => "bcftools",
            CallerStrategy::Staged => "gatk",
        }
    }
}

impl fmt::Display for CallerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.caller_name())
    }
}

impl FromStr for CallerStrategy {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "bcftools" => Ok(CallerStrategy::Direct),
            "gatk" => Ok(CallerStrategy::Staged),
            _ => Err(PlanError::UnknownCaller(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    DepthProfile,
    CallVariantsDirect,
    CallVariantsStaged,
    GenotypeInfer,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::DepthProfile => "depth-profile",
            StageKind::CallVariantsDirect => "call-variants-direct",
            StageKind::CallVariantsStaged => "call-variants-staged",
            StageKind::GenotypeInfer => "genotype-infer",
        }
    }

    pub fn script_name(&self) -> String {
        format!("{}.sh", self.as_str())
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneKey(String);

impl GeneKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeneKey {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(PlanError::UnknownGene(value.trim().to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId(String);

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleId {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(PlanError::InvalidSampleId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Prefix shared by every job name of one compiled plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunToken(String);

const TOKEN_TAIL_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_TAIL_LEN: usize = 5;

impl RunToken {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut token = String::with_capacity(TOKEN_TAIL_LEN + 1);
        token.push(rng.gen_range(b'a'..=b'z') as char);
        for _ in 0..TOKEN_TAIL_LEN {
            let idx = rng.gen_range(0..TOKEN_TAIL_CHARS.len());
            token.push(TOKEN_TAIL_CHARS[idx] as char);
        }
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunToken {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        // SGE rejects job names that start with a digit.
        let is_valid = (1..=32).contains(&trimmed.len())
            && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric())
            && trimmed
                .chars()
                .next()
                .map(|ch| ch.is_ascii_alphabetic())
                .unwrap_or(false);
        if !is_valid {
            return Err(PlanError::InvalidRunToken(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}
