pub mod config;
pub mod dataset;
pub mod error;
pub mod ids;
pub mod pipeline;
pub mod value;

pub use error::{EntityKind, PipelineError, PipelineResult};
