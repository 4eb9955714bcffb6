pub mod errors;
pub mod export;
pub mod orchestrator;
pub mod pipeline;

pub use errors::{ErrorKind, WorkflowError};
pub use export::EXPORT_MEDIA_TYPE;
pub use orchestrator::Workflow;
pub use pipeline::PipelineState;
