//! Planning of the multi-step store operations.
//!
//! A plan performs every fallible lookup first, then allocates identifiers,
//! builds the records and returns them as an ordered [`Transaction`]. Nothing
//! is written to the registries here; the store commits the transaction as
//! one unit afterwards.

use super::events::{Notification, RegistryEvent};
use super::state::VisState;
use crate::core::dataset::{
    AggregateTransform, Dataset, DatasetDraft, GroupingKey, SchemaDeriver, Transform,
};
use crate::core::error::{EntityKind, PipelineError, PipelineResult};
use crate::core::ids::Identifier;
use crate::core::pipeline::{Pipeline, PipelineDraft};
use crate::core::value::Datum;
use serde::{Deserialize, Serialize};

/// Registry events to commit together, followed by the notifications to
/// emit once they have landed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Transaction {
    pub events: Vec<RegistryEvent>,
    pub notifications: Vec<Notification>,
}

/// Result of aggregating a pipeline: the transform together with the
/// dataset it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub transform: Transform,
    pub dataset_id: Identifier,
    pub key: GroupingKey,
}

pub(crate) struct Sequencer<'a, D: ?Sized> {
    state: &'a mut VisState,
    deriver: &'a D,
}

impl<'a, D: SchemaDeriver + ?Sized> Sequencer<'a, D> {
    pub fn new(state: &'a mut VisState, deriver: &'a D) -> Self {
        Self { state, deriver }
    }

    /// Plan a new pipeline with its root dataset.
    ///
    /// The dataset event comes first so the pipeline never points at a
    /// source that does not exist yet.
    pub fn create_pipeline(
        &mut self,
        draft: PipelineDraft,
        dataset: DatasetDraft,
        values: Option<Vec<Datum>>,
    ) -> PipelineResult<(Identifier, Transaction)> {
        let values = values.ok_or_else(|| PipelineError::MissingValues {
            pipeline: draft.name.clone(),
        })?;

        // Allocate on a copy so an exhausted id space leaves the counter as it was
        let mut ids = self.state.ids.clone();
        let pipeline_id = match draft.id {
            Some(id) if self.state.id_taken(id) => {
                return Err(PipelineError::DuplicateIdentifier(id));
            }
            Some(id) => {
                ids.reserve(id)?;
                id
            }
            None => ids.allocate()?,
        };
        let dataset_id = ids.allocate()?;
        self.state.ids = ids;

        let source = Dataset::root(
            dataset_id,
            Pipeline::source_name(&draft.name, pipeline_id),
            dataset,
            values,
        )
        .with_parent(pipeline_id);
        let pipeline = Pipeline::new(pipeline_id, draft.name, dataset_id);

        let txn = Transaction {
            events: vec![
                RegistryEvent::DatasetCreated { dataset: source },
                RegistryEvent::PipelineCreated { pipeline },
            ],
            notifications: vec![Notification::PipelineSelected { pipeline_id }],
        };
        Ok((pipeline_id, txn))
    }

    /// Plan an aggregation of `pipeline_id` into a new derived dataset.
    pub fn aggregate_pipeline(
        &mut self,
        pipeline_id: Identifier,
        transform: AggregateTransform,
    ) -> PipelineResult<(Aggregation, Transaction)> {
        let pipeline = self
            .state
            .pipelines
            .get(pipeline_id)
            .ok_or_else(|| PipelineError::not_found(EntityKind::Pipeline, pipeline_id))?;
        let source = self.state.datasets.get(pipeline.source_id).ok_or_else(|| {
            PipelineError::Integrity(format!(
                "Source dataset {} of pipeline {} is missing",
                pipeline.source_id, pipeline_id
            ))
        })?;

        let schema = self
            .deriver
            .derive_aggregate_schema(&source.schema, &transform)?;
        let key = transform.grouping_key();
        let name = pipeline.groupby_name(&key);
        let source_id = pipeline.source_id;

        let dataset_id = self.state.allocate()?;
        let transform = Transform::Aggregate(transform);
        let derived = Dataset::derived(
            dataset_id,
            name,
            source_id,
            vec![transform.clone()],
            schema,
        )
        .with_parent(pipeline_id);

        let txn = Transaction {
            events: vec![
                RegistryEvent::DatasetCreated { dataset: derived },
                RegistryEvent::PipelineDerivedLinkUpdated {
                    pipeline_id,
                    key: key.clone(),
                    dataset_id,
                },
            ],
            notifications: Vec::new(),
        };
        let aggregation = Aggregation {
            transform,
            dataset_id,
            key,
        };
        Ok((aggregation, txn))
    }
}
