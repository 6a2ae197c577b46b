use super::events::RegistryEvent;
use crate::core::dataset::{Dataset, DatasetGraph, DatasetRegistry, IntegrityIssue};
use crate::core::error::{EntityKind, PipelineError, PipelineResult};
use crate::core::ids::{IdAllocator, Identifier};
use crate::core::pipeline::{Pipeline, PipelineRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The shared state container: both registries plus the identifier counter.
///
/// Registries only change through [`RegistryEvent`]s. The allocator is
/// advanced directly while an operation is planned, since handing out an
/// identifier is not an observable write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisState {
    pub(crate) datasets: DatasetRegistry,
    pub(crate) pipelines: PipelineRegistry,
    pub(crate) ids: IdAllocator,
}

impl VisState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_start(start: u64) -> Self {
        Self {
            ids: IdAllocator::starting_at(start),
            ..Default::default()
        }
    }

    pub fn datasets(&self) -> &DatasetRegistry {
        &self.datasets
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn graph(&self) -> DatasetGraph<'_> {
        DatasetGraph::new(&self.datasets, &self.pipelines)
    }

    /// Whether `id` names any record in either registry.
    pub fn id_taken(&self, id: Identifier) -> bool {
        self.datasets.exists(id) || self.pipelines.exists(id)
    }

    pub(crate) fn allocate(&mut self) -> PipelineResult<Identifier> {
        self.ids.allocate()
    }

    /// Pure transition: consume a state, return the state after `event`.
    pub(crate) fn apply(mut self, event: &RegistryEvent) -> PipelineResult<Self> {
        self.apply_in_place(event)?;
        Ok(self)
    }

    /// Apply one event. Each arm checks before it writes, so a rejected
    /// event leaves the state untouched.
    fn apply_in_place(&mut self, event: &RegistryEvent) -> PipelineResult<()> {
        debug!(event = event.name(), subject = event.subject().0, "applying registry event");
        match event {
            RegistryEvent::DatasetCreated { dataset } => {
                if self.pipelines.exists(dataset.id) {
                    return Err(PipelineError::DuplicateIdentifier(dataset.id));
                }
                self.ids.reserve(dataset.id)?;
                self.datasets.register(dataset.clone())?;
            }
            RegistryEvent::PipelineCreated { pipeline } => {
                if self.datasets.exists(pipeline.id) {
                    return Err(PipelineError::DuplicateIdentifier(pipeline.id));
                }
                self.ids.reserve(pipeline.id)?;
                self.pipelines.register(pipeline.clone())?;
            }
            RegistryEvent::PipelineDerivedLinkUpdated {
                pipeline_id,
                key,
                dataset_id,
            } => {
                self.pipelines.link(*pipeline_id, key.clone(), *dataset_id)?;
            }
        }
        Ok(())
    }

    /// Verify a whole transaction against the current state, then apply it.
    /// Either every event lands or none does.
    pub(crate) fn commit(&mut self, events: &[RegistryEvent]) -> PipelineResult<()> {
        self.verify(events)?;
        for event in events {
            self.apply_in_place(event)?;
        }
        Ok(())
    }

    /// Check that applying `events` in order leaves no dangling link.
    ///
    /// A dataset may name as parent a pipeline created later in the same
    /// transaction, but a pipeline's source and a derived link's target must
    /// already be published when the event referencing them is reached.
    pub(crate) fn verify(&self, events: &[RegistryEvent]) -> PipelineResult<()> {
        let incoming_pipelines: HashSet<Identifier> = events
            .iter()
            .filter_map(|e| match e {
                RegistryEvent::PipelineCreated { pipeline } => Some(pipeline.id),
                _ => None,
            })
            .collect();
        // dataset id -> parent pipeline, for datasets published so far
        let mut published: HashMap<Identifier, Option<Identifier>> = HashMap::new();
        let mut published_pipelines: HashSet<Identifier> = HashSet::new();

        let parent_of = |published: &HashMap<Identifier, Option<Identifier>>,
                         id: Identifier|
         -> Option<Option<Identifier>> {
            self.datasets
                .get(id)
                .map(|d| d.parent_id)
                .or_else(|| published.get(&id).copied())
        };

        for event in events {
            match event {
                RegistryEvent::DatasetCreated { dataset } => {
                    if self.id_taken(dataset.id)
                        || published.contains_key(&dataset.id)
                        || incoming_pipelines.contains(&dataset.id)
                    {
                        return Err(PipelineError::DuplicateIdentifier(dataset.id));
                    }
                    dataset.id.successor()?;
                    verify_dataset(self, dataset, &published, &incoming_pipelines)?;
                    published.insert(dataset.id, dataset.parent_id);
                }
                RegistryEvent::PipelineCreated { pipeline } => {
                    if self.id_taken(pipeline.id)
                        || published.contains_key(&pipeline.id)
                        || published_pipelines.contains(&pipeline.id)
                    {
                        return Err(PipelineError::DuplicateIdentifier(pipeline.id));
                    }
                    pipeline.id.successor()?;
                    verify_pipeline(pipeline, parent_of(&published, pipeline.source_id))?;
                    published_pipelines.insert(pipeline.id);
                }
                RegistryEvent::PipelineDerivedLinkUpdated {
                    pipeline_id,
                    key,
                    dataset_id,
                } => {
                    if !self.pipelines.exists(*pipeline_id)
                        && !published_pipelines.contains(pipeline_id)
                    {
                        return Err(PipelineError::not_found(EntityKind::Pipeline, *pipeline_id));
                    }
                    match parent_of(&published, *dataset_id) {
                        Some(Some(parent)) if parent == *pipeline_id => {}
                        Some(_) => {
                            return Err(PipelineError::Integrity(format!(
                                "Dataset {} linked under key '{}' is not owned by pipeline {}",
                                dataset_id, key, pipeline_id
                            )))
                        }
                        None => {
                            return Err(PipelineError::Integrity(format!(
                                "Pipeline {} links unpublished dataset {}",
                                pipeline_id, dataset_id
                            )))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Rebuild a state by applying `events` in order to an empty one.
    pub(crate) fn replay<'e, I>(events: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = &'e RegistryEvent>,
    {
        let state = events
            .into_iter()
            .try_fold(VisState::new(), |state, event| state.apply(event))?;

        let issues = state.graph().verify();
        if let Some(first) = issues.first() {
            return Err(PipelineError::Integrity(format!(
                "Replayed state has {} integrity issue(s); first: {}",
                issues.len(),
                first
            )));
        }
        Ok(state)
    }

    /// Audit the registries.
    pub fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        self.graph().verify()
    }
}

fn verify_dataset(
    state: &VisState,
    dataset: &Dataset,
    published: &HashMap<Identifier, Option<Identifier>>,
    incoming_pipelines: &HashSet<Identifier>,
) -> PipelineResult<()> {
    dataset.check_shape().map_err(PipelineError::Integrity)?;

    if let Some(source) = dataset.source_id {
        if !state.datasets.exists(source) && !published.contains_key(&source) {
            return Err(PipelineError::Integrity(format!(
                "Dataset {} derives from unpublished dataset {}",
                dataset.id, source
            )));
        }
    }
    if let Some(parent) = dataset.parent_id {
        if !state.pipelines.exists(parent) && !incoming_pipelines.contains(&parent) {
            return Err(PipelineError::Integrity(format!(
                "Dataset {} belongs to unknown pipeline {}",
                dataset.id, parent
            )));
        }
    }
    Ok(())
}

fn verify_pipeline(pipeline: &Pipeline, source_parent: Option<Option<Identifier>>) -> PipelineResult<()> {
    match source_parent {
        None => Err(PipelineError::Integrity(format!(
            "Pipeline {} published before its source dataset {}",
            pipeline.id, pipeline.source_id
        ))),
        Some(parent) if parent != Some(pipeline.id) => Err(PipelineError::Integrity(format!(
            "Source dataset {} of pipeline {} is not owned by it",
            pipeline.source_id, pipeline.id
        ))),
        Some(_) if !pipeline.derived.is_empty() => Err(PipelineError::Integrity(format!(
            "Pipeline {} must be created without derived links",
            pipeline.id
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::{AggregateTransform, DatasetDraft, DatasetSchema, GroupingKey};

    fn source(id: u64, pipeline: u64) -> RegistryEvent {
        RegistryEvent::DatasetCreated {
            dataset: Dataset::root(Identifier(id), "src", DatasetDraft::new(), Vec::new())
                .with_parent(Identifier(pipeline)),
        }
    }

    fn pipeline(id: u64, source: u64) -> RegistryEvent {
        RegistryEvent::PipelineCreated {
            pipeline: Pipeline::new(Identifier(id), "p", Identifier(source)),
        }
    }

    #[test]
    fn test_commit_in_dependency_order() {
        let mut state = VisState::new();
        state.commit(&[source(2, 1), pipeline(1, 2)]).unwrap();

        assert!(state.datasets().exists(Identifier(2)));
        assert!(state.pipelines().exists(Identifier(1)));
        assert!(state.integrity_issues().is_empty());
        // applied ids push the allocator floor
        assert_eq!(state.ids().peek(), Identifier(3));
    }

    #[test]
    fn test_pipeline_before_source_rejected() {
        let mut state = VisState::new();
        let err = state.commit(&[pipeline(1, 2), source(2, 1)]).unwrap_err();

        assert!(matches!(err, PipelineError::Integrity(_)));
        assert!(state.datasets().is_empty());
        assert!(state.pipelines().is_empty());
    }

    #[test]
    fn test_dataset_with_unknown_parent_rejected() {
        let mut state = VisState::new();
        let err = state.commit(&[source(2, 99)]).unwrap_err();
        assert!(matches!(err, PipelineError::Integrity(_)));
        assert!(state.datasets().is_empty());
    }

    #[test]
    fn test_link_requires_owned_dataset() {
        let mut state = VisState::new();
        state.commit(&[source(2, 1), pipeline(1, 2)]).unwrap();
        state.commit(&[source(4, 3), pipeline(3, 4)]).unwrap();

        let derived = Dataset::derived(
            Identifier(5),
            "d",
            Identifier(4),
            vec![AggregateTransform::group_by(["a"]).into()],
            DatasetSchema::default(),
        )
        .with_parent(Identifier(3));

        let err = state
            .commit(&[
                RegistryEvent::DatasetCreated { dataset: derived },
                RegistryEvent::PipelineDerivedLinkUpdated {
                    pipeline_id: Identifier(1),
                    key: GroupingKey::from("a"),
                    dataset_id: Identifier(5),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Integrity(_)));
        assert!(!state.datasets().exists(Identifier(5)));
    }

    #[test]
    fn test_duplicate_across_registries() {
        let mut state = VisState::new();
        state.commit(&[source(2, 1), pipeline(1, 2)]).unwrap();

        let err = state.commit(&[source(1, 1)]).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateIdentifier(Identifier(1))));
    }

    #[test]
    fn test_commit_rejects_last_identifier() {
        let mut state = VisState::new();
        let err = state
            .commit(&[source(2, u64::MAX), pipeline(u64::MAX, 2)])
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::IdentifierExhausted(Identifier(u64::MAX))
        ));
        assert!(state.datasets().is_empty());
        assert_eq!(state.ids().peek(), Identifier(1));
    }

    #[test]
    fn test_replay_matches_commit() {
        let events = vec![source(2, 1), pipeline(1, 2)];
        let mut committed = VisState::new();
        committed.commit(&events).unwrap();

        let replayed = VisState::replay(&events).unwrap();
        assert_eq!(replayed, committed);
    }

    #[test]
    fn test_replay_rejects_dangling() {
        let err = VisState::replay(&[source(2, 1)]).unwrap_err();
        assert!(matches!(err, PipelineError::Integrity(_)));
    }
}
