use crate::core::dataset::{Dataset, GroupingKey};
use crate::core::ids::Identifier;
use crate::core::pipeline::Pipeline;
use serde::{Deserialize, Serialize};

/// A write against one of the registries. These are the only ways the
/// registries ever change; they are applied by the store, never by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    DatasetCreated { dataset: Dataset },
    PipelineCreated { pipeline: Pipeline },
    PipelineDerivedLinkUpdated {
        pipeline_id: Identifier,
        key: GroupingKey,
        dataset_id: Identifier,
    },
}

impl RegistryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::DatasetCreated { .. } => "dataset_created",
            RegistryEvent::PipelineCreated { .. } => "pipeline_created",
            RegistryEvent::PipelineDerivedLinkUpdated { .. } => "pipeline_derived_link_updated",
        }
    }

    /// Id of the record this event creates or changes.
    pub fn subject(&self) -> Identifier {
        match self {
            RegistryEvent::DatasetCreated { dataset } => dataset.id,
            RegistryEvent::PipelineCreated { pipeline } => pipeline.id,
            RegistryEvent::PipelineDerivedLinkUpdated { pipeline_id, .. } => *pipeline_id,
        }
    }
}

/// Emitted after every registry write of an operation has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notification", rename_all = "snake_case")]
pub enum Notification {
    PipelineSelected { pipeline_id: Identifier },
}

/// Everything a subscriber can observe, in commit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreEvent {
    Registry(RegistryEvent),
    Notification(Notification),
}

impl From<RegistryEvent> for StoreEvent {
    fn from(e: RegistryEvent) -> Self {
        StoreEvent::Registry(e)
    }
}

impl From<Notification> for StoreEvent {
    fn from(n: Notification) -> Self {
        StoreEvent::Notification(n)
    }
}
