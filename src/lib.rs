// src/lib.rs

pub mod core;
pub mod engine;

// Re-exports for a flat public API
pub use crate::core::config::{ConfigError, EngineConfig};
pub use crate::core::dataset::{
    AggregateOp, AggregateSchemaDeriver, AggregateTransform, ColumnSchema, Dataset, DatasetDraft,
    DatasetGraph, DatasetSchema, DerivationError, GroupingKey, IntegrityIssue, MeasureType,
    SchemaDeriver, Transform,
};
pub use crate::core::error::{EntityKind, PipelineError, PipelineResult};
pub use crate::core::ids::{IdAllocator, Identifier, TransactionId};
pub use crate::core::pipeline::{Pipeline, PipelineDraft};
pub use crate::core::value::{Datum, Value, ValueType};
pub use crate::engine::{
    Aggregation, Notification, PipelineStore, RegistryEvent, SharedStore, StoreEvent, VisState,
};
