use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{GeneKey, SampleId};
use crate::error::PlanError;

pub const NONE: &str = "NONE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationGroups {
    groups: BTreeMap<GeneKey, Vec<SampleId>>,
}

impl NormalizationGroups {
    pub fn parse(spec: &str) -> Result<Self, PlanError> {
        let spec = spec.trim();
        if spec == NONE || spec.is_empty() {
            return Ok(Self::default());
        }

        let mut groups = BTreeMap::new();
        for section in spec.split('|') {
            let fields = section.split(',').map(str::trim).collect::<Vec<_>>();
            if fields.len() < 2 || fields.iter().any(|field| field.is_empty()) {
                return Err(PlanError::MalformedGroup(section.trim().to_string()));
            }
            let gene: GeneKey = fields[0]
                .parse()
                .map_err(|_| PlanError::MalformedGroup(section.trim().to_string()))?;
            let samples = fields[1..]
                .iter()
                .map(|name| {
                    name.parse::<SampleId>()
                        .map_err(|_| PlanError::MalformedGroup(section.trim().to_string()))
                })
                .collect::<Result<Vec<_>, PlanError>>()?;
            groups.insert(gene, samples);
        }
        Ok(Self { groups })
    }

    pub fn get(&self, gene: &GeneKey) -> Option<&[SampleId]> {
        self.groups.get(gene).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}
