use std::collections::{HashMap, HashSet};
use std::fmt;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::debug;

use crate::domain::{CallerStrategy, GeneKey, RunToken, StageKind};
use crate::error::PlanError;
use crate::layout::RunLayout;

type StageSpec = (StageKind, &'static [StageKind]);

const DIRECT: &[StageSpec] = &[
    (StageKind::CallVariantsDirect, &[]),
    (StageKind::GenotypeInfer, &[StageKind::CallVariantsDirect]),
];

const DIRECT_WITH_DEPTH: &[StageSpec] = &[
    (StageKind::DepthProfile, &[]),
    (StageKind::CallVariantsDirect, &[]),
    (
        StageKind::GenotypeInfer,
        &[StageKind::DepthProfile, StageKind::CallVariantsDirect],
    ),
];

const STAGED: &[StageSpec] = &[
    (StageKind::CallVariantsStaged, &[]),
    (StageKind::GenotypeInfer, &[StageKind::CallVariantsStaged]),
];

const STAGED_WITH_DEPTH: &[StageSpec] = &[
    (StageKind::DepthProfile, &[]),
    (StageKind::CallVariantsStaged, &[]),
    (
        StageKind::GenotypeInfer,
        &[StageKind::DepthProfile, StageKind::CallVariantsStaged],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    Direct,
    DirectWithDepth,
    Staged,
    StagedWithDepth,
}

impl Topology {
    pub fn select(caller: CallerStrategy, has_control_gene: bool) -> Self {
        match (caller, has_control_gene) {
            (CallerStrategy::Direct, false) => Topology::Direct,
            (CallerStrategy::Direct, true) => Topology::DirectWithDepth,
            (CallerStrategy::Staged, false) => Topology::Staged,
            (CallerStrategy::Staged, true) => Topology::StagedWithDepth,
        }
    }

    pub fn stages(&self) -> &'static [StageSpec] {
        match self {
            Topology::Direct => DIRECT,
            Topology::DirectWithDepth => DIRECT_WITH_DEPTH,
            Topology::Staged => STAGED,
            Topology::StagedWithDepth => STAGED_WITH_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StageId {
    pub gene: GeneKey,
    pub kind: StageKind,
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gene, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub id: StageId,
    pub predecessors: Vec<StageId>,
    pub script: Utf8PathBuf,
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        self.id.kind
    }

    pub fn gene(&self) -> &GeneKey {
        &self.id.gene
    }

    pub fn is_root(&self) -> bool {
        self.predecessors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenePlan {
    pub gene: GeneKey,
    pub stages: Vec<Stage>,
}

impl GenePlan {
    /// Roots first, then dependents. Ties keep the declared stage order.
    pub fn topological_order(&self) -> Result<Vec<&Stage>, PlanError> {
        let ids = self
            .stages
            .iter()
            .map(|stage| &stage.id)
            .collect::<HashSet<_>>();
        for stage in &self.stages {
            if let Some(missing) = stage.predecessors.iter().find(|pred| !ids.contains(pred)) {
                return Err(PlanError::DanglingPredecessor {
                    stage: stage.id.to_string(),
                    predecessor: missing.to_string(),
                });
            }
        }

        let mut pending = self
            .stages
            .iter()
            .map(|stage| (&stage.id, stage.predecessors.len()))
            .collect::<HashMap<_, _>>();
        let mut ordered: Vec<&Stage> = Vec::with_capacity(self.stages.len());
        while ordered.len() < self.stages.len() {
            let next = self.stages.iter().find(|stage| {
                pending.get(&stage.id) == Some(&0) && !ordered.iter().any(|done| done.id == stage.id)
            });
            let Some(next) = next else {
                return Err(PlanError::DependencyCycle(self.gene.to_string()));
            };
            for stage in &self.stages {
                if stage.predecessors.contains(&next.id) {
                    if let Some(count) = pending.get_mut(&stage.id) {
                        *count -= 1;
                    }
                }
            }
            ordered.push(next);
        }
        Ok(ordered)
    }
}

pub fn plan_gene(
    gene: &GeneKey,
    caller: CallerStrategy,
    has_control_gene: bool,
    layout: &RunLayout,
) -> Vec<Stage> {
    let topology = Topology::select(caller, has_control_gene);
    topology
        .stages()
        .iter()
        .map(|(kind, predecessors)| Stage {
            id: StageId {
                gene: gene.clone(),
                kind: *kind,
            },
            predecessors: predecessors
                .iter()
                .map(|pred| StageId {
                    gene: gene.clone(),
                    kind: *pred,
                })
                .collect(),
            script: layout.script_path(gene, *kind),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelinePlan {
    pub run_root: Utf8PathBuf,
    pub token: RunToken,
    pub caller: CallerStrategy,
    pub topology: Topology,
    pub genes: Vec<GenePlan>,
}

impl PipelinePlan {
    pub fn build(
        layout: &RunLayout,
        token: RunToken,
        genes: &[GeneKey],
        caller: CallerStrategy,
        has_control_gene: bool,
    ) -> Self {
        let genes = genes
            .iter()
            .map(|gene| GenePlan {
                gene: gene.clone(),
                stages: plan_gene(gene, caller, has_control_gene, layout),
            })
            .collect::<Vec<_>>();
        let plan = Self {
            run_root: layout.root().to_path_buf(),
            token,
            caller,
            topology: Topology::select(caller, has_control_gene),
            genes,
        };
        debug!(genes = plan.genes.len(), stages = plan.stage_count(), "built pipeline plan");
        plan
    }

    pub fn stage_count(&self) -> usize {
        self.genes.iter().map(|gene| gene.stages.len()).sum()
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.genes.iter().flat_map(|gene| gene.stages.iter())
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        for gene in &self.genes {
            gene.topological_order()?;
        }
        Ok(())
    }
}
