pub mod config;
pub mod lockfile;
pub mod manifest;
pub mod ml;
pub mod observability;
pub mod pipeline;
pub mod resources;
pub mod validation;
pub mod workflows;

pub use config::FlowConfig;
pub use pipeline::{ArtifactFile, Workflow, WorkflowExecutor, WorkflowRegistry, WorkflowResult};
pub use workflows::run_workflow;
