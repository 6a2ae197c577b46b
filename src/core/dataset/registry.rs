use super::dataset::Dataset;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::ids::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical store of dataset records, keyed by id.
/// Owned by the store state; writes only happen through registry events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRegistry {
    datasets: BTreeMap<Identifier, Dataset>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, dataset: Dataset) -> PipelineResult<()> {
        if self.datasets.contains_key(&dataset.id) {
            return Err(PipelineError::DuplicateIdentifier(dataset.id));
        }
        self.datasets.insert(dataset.id, dataset);
        Ok(())
    }

    pub fn get(&self, id: Identifier) -> Option<&Dataset> {
        self.datasets.get(&id)
    }

    pub fn exists(&self, id: Identifier) -> bool {
        self.datasets.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<Identifier> {
        self.datasets.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Find a dataset by name. Names are not unique; the lowest id wins.
    pub fn get_by_name(&self, name: &str) -> Option<&Dataset> {
        self.datasets.values().find(|ds| ds.name == name)
    }

    /// All datasets owned by a pipeline.
    pub fn children_of(&self, pipeline: Identifier) -> Vec<&Dataset> {
        self.datasets
            .values()
            .filter(|ds| ds.parent_id == Some(pipeline))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::dataset::DatasetDraft;

    #[test]
    fn test_register_rejects_duplicates() {
        let mut reg = DatasetRegistry::new();
        let ds = Dataset::root(Identifier(1), "a", DatasetDraft::new(), Vec::new());
        reg.register(ds.clone()).unwrap();

        let err = reg.register(ds).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateIdentifier(Identifier(1))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_lookup_helpers() {
        let mut reg = DatasetRegistry::new();
        reg.register(
            Dataset::root(Identifier(4), "a", DatasetDraft::new(), Vec::new())
                .with_parent(Identifier(3)),
        )
        .unwrap();
        reg.register(Dataset::root(Identifier(5), "b", DatasetDraft::new(), Vec::new()))
            .unwrap();

        assert_eq!(reg.get_by_name("b").map(|d| d.id), Some(Identifier(5)));
        assert_eq!(reg.children_of(Identifier(3)).len(), 1);
        assert_eq!(reg.ids(), vec![Identifier(4), Identifier(5)]);
    }
}
