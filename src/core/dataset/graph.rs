use super::registry::DatasetRegistry;
use crate::core::error::{EntityKind, PipelineError, PipelineResult};
use crate::core::ids::Identifier;
use crate::core::pipeline::PipelineRegistry;
use std::collections::HashSet;
use std::fmt;

/// A broken link or record found while auditing the registries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    MissingSource { dataset: Identifier, source: Identifier },
    MissingParent { dataset: Identifier, parent: Identifier },
    MalformedDataset { dataset: Identifier, reason: String },
    MissingPipelineSource { pipeline: Identifier, source: Identifier },
    ForeignSource { pipeline: Identifier, source: Identifier },
    MissingDerived { pipeline: Identifier, dataset: Identifier },
    ForeignDerived { pipeline: Identifier, dataset: Identifier },
    Cycle { dataset: Identifier },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::MissingSource { dataset, source } => {
                write!(f, "Dataset {} derives from missing dataset {}", dataset, source)
            }
            IntegrityIssue::MissingParent { dataset, parent } => {
                write!(f, "Dataset {} belongs to missing pipeline {}", dataset, parent)
            }
            IntegrityIssue::MalformedDataset { reason, .. } => f.write_str(reason),
            IntegrityIssue::MissingPipelineSource { pipeline, source } => write!(
                f,
                "Pipeline {} has missing source dataset {}",
                pipeline, source
            ),
            IntegrityIssue::ForeignSource { pipeline, source } => write!(
                f,
                "Pipeline {} source dataset {} is owned by another pipeline",
                pipeline, source
            ),
            IntegrityIssue::MissingDerived { pipeline, dataset } => write!(
                f,
                "Pipeline {} links missing dataset {}",
                pipeline, dataset
            ),
            IntegrityIssue::ForeignDerived { pipeline, dataset } => write!(
                f,
                "Pipeline {} links dataset {} owned by another pipeline",
                pipeline, dataset
            ),
            IntegrityIssue::Cycle { dataset } => {
                write!(f, "Circular source chain detected at dataset {}", dataset)
            }
        }
    }
}

/// Read-only view across both registries for resolving and auditing links.
pub struct DatasetGraph<'a> {
    datasets: &'a DatasetRegistry,
    pipelines: &'a PipelineRegistry,
}

impl<'a> DatasetGraph<'a> {
    pub fn new(datasets: &'a DatasetRegistry, pipelines: &'a PipelineRegistry) -> Self {
        Self {
            datasets,
            pipelines,
        }
    }

    /// Source chain of a dataset, starting with the dataset itself and
    /// ending at its root.
    pub fn lineage(&self, id: Identifier) -> PipelineResult<Vec<Identifier>> {
        let mut chain = Vec::new();
        self.lineage_recursive(id, &mut chain, &mut HashSet::new())?;
        Ok(chain)
    }

    fn lineage_recursive(
        &self,
        id: Identifier,
        chain: &mut Vec<Identifier>,
        visited: &mut HashSet<Identifier>,
    ) -> PipelineResult<()> {
        if !visited.insert(id) {
            return Err(PipelineError::Integrity(
                IntegrityIssue::Cycle { dataset: id }.to_string(),
            ));
        }

        let ds = self
            .datasets
            .get(id)
            .ok_or_else(|| PipelineError::not_found(EntityKind::Dataset, id))?;
        chain.push(id);

        match ds.source_id {
            Some(source) => self.lineage_recursive(source, chain, visited),
            None => Ok(()),
        }
    }

    /// Root dataset a dataset is ultimately computed from.
    pub fn root_of(&self, id: Identifier) -> PipelineResult<Identifier> {
        let chain = self.lineage(id)?;
        chain
            .last()
            .copied()
            .ok_or_else(|| PipelineError::not_found(EntityKind::Dataset, id))
    }

    /// Derived datasets that no pipeline links to any more.
    pub fn orphans(&self) -> Vec<Identifier> {
        let linked: HashSet<Identifier> = self
            .pipelines
            .iter()
            .flat_map(|p| p.derived.values().copied())
            .collect();
        self.datasets
            .iter()
            .filter(|ds| ds.is_derived() && !linked.contains(&ds.id))
            .map(|ds| ds.id)
            .collect()
    }

    /// Check every linking invariant across both registries.
    pub fn verify(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();

        for ds in self.datasets.iter() {
            if let Err(reason) = ds.check_shape() {
                issues.push(IntegrityIssue::MalformedDataset {
                    dataset: ds.id,
                    reason,
                });
            }
            if let Some(source) = ds.source_id {
                if !self.datasets.exists(source) {
                    issues.push(IntegrityIssue::MissingSource {
                        dataset: ds.id,
                        source,
                    });
                } else if let Err(PipelineError::Integrity(_)) = self.lineage(ds.id) {
                    issues.push(IntegrityIssue::Cycle { dataset: ds.id });
                }
            }
            if let Some(parent) = ds.parent_id {
                if !self.pipelines.exists(parent) {
                    issues.push(IntegrityIssue::MissingParent {
                        dataset: ds.id,
                        parent,
                    });
                }
            }
        }

        for p in self.pipelines.iter() {
            match self.datasets.get(p.source_id) {
                None => issues.push(IntegrityIssue::MissingPipelineSource {
                    pipeline: p.id,
                    source: p.source_id,
                }),
                Some(src) if src.parent_id != Some(p.id) => {
                    issues.push(IntegrityIssue::ForeignSource {
                        pipeline: p.id,
                        source: p.source_id,
                    })
                }
                Some(_) => {}
            }

            for &dataset in p.derived.values() {
                match self.datasets.get(dataset) {
                    None => issues.push(IntegrityIssue::MissingDerived {
                        pipeline: p.id,
                        dataset,
                    }),
                    Some(ds) if ds.parent_id != Some(p.id) => {
                        issues.push(IntegrityIssue::ForeignDerived {
                            pipeline: p.id,
                            dataset,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        issues
    }
}
