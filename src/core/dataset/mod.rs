pub mod dataset;
pub mod derive;
pub mod graph;
pub mod registry;
pub mod schema;
pub mod transform;

pub use dataset::{Dataset, DatasetDraft};
pub use derive::{AggregateSchemaDeriver, DerivationError, SchemaDeriver};
pub use graph::{DatasetGraph, IntegrityIssue};
pub use registry::DatasetRegistry;
pub use schema::{ColumnSchema, DatasetSchema, MeasureType};
pub use transform::{AggregateOp, AggregateTransform, GroupingKey, Transform};
