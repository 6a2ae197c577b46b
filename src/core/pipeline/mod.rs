pub mod pipeline;
pub mod registry;

pub use pipeline::{Pipeline, PipelineDraft};
pub use registry::PipelineRegistry;
