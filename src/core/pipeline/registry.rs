use super::pipeline::Pipeline;
use crate::core::dataset::transform::GroupingKey;
use crate::core::error::{EntityKind, PipelineError, PipelineResult};
use crate::core::ids::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical store of pipeline records, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<Identifier, Pipeline>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, pipeline: Pipeline) -> PipelineResult<()> {
        if self.pipelines.contains_key(&pipeline.id) {
            return Err(PipelineError::DuplicateIdentifier(pipeline.id));
        }
        self.pipelines.insert(pipeline.id, pipeline);
        Ok(())
    }

    /// Point `key` at `dataset`, replacing any previous link for that key.
    /// Returns the dataset the key pointed to before.
    pub(crate) fn link(
        &mut self,
        pipeline: Identifier,
        key: GroupingKey,
        dataset: Identifier,
    ) -> PipelineResult<Option<Identifier>> {
        let p = self
            .pipelines
            .get_mut(&pipeline)
            .ok_or_else(|| PipelineError::not_found(EntityKind::Pipeline, pipeline))?;
        Ok(p.derived.insert(key, dataset))
    }

    pub fn get(&self, id: Identifier) -> Option<&Pipeline> {
        self.pipelines.get(&id)
    }

    pub fn exists(&self, id: Identifier) -> bool {
        self.pipelines.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<Identifier> {
        self.pipelines.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.values().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_overwrites() {
        let mut reg = PipelineRegistry::new();
        reg.register(Pipeline::new(Identifier(1), "p", Identifier(2)))
            .unwrap();

        let key = GroupingKey::from("a");
        assert_eq!(reg.link(Identifier(1), key.clone(), Identifier(3)).unwrap(), None);
        assert_eq!(
            reg.link(Identifier(1), key.clone(), Identifier(4)).unwrap(),
            Some(Identifier(3))
        );
        assert_eq!(
            reg.get(Identifier(1)).unwrap().derived_dataset(&key),
            Some(Identifier(4))
        );
    }

    #[test]
    fn test_link_unknown_pipeline() {
        let mut reg = PipelineRegistry::new();
        let err = reg
            .link(Identifier(9), GroupingKey::from("a"), Identifier(3))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotFound {
                kind: EntityKind::Pipeline,
                id: Identifier(9)
            }
        ));
    }
}
