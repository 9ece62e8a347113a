use anyhow::Result;

use crate::config::FlowConfig;
use crate::pipeline::{WorkflowRegistry, WorkflowResult, build_workflow};

pub mod hello;
pub mod model_deployment;

pub use hello::{HelloWorkflow, say_hello};
pub use model_deployment::{
    DEPLOYMENT_STATUS, ModelDeploymentWorkflow, TrainedArtifacts, create_kserve_manifest,
    deploy_model, train_model,
};

pub fn register_defaults(registry: &mut WorkflowRegistry) {
    registry.register(hello::NAME, |config| {
        Ok(Box::new(HelloWorkflow::from_config(config)))
    });
    registry.register(model_deployment::NAME, |config| {
        Ok(Box::new(ModelDeploymentWorkflow::from_config(config)))
    });
}

pub fn default_registry() -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    register_defaults(&mut registry);
    registry
}

/// Builds and runs one registered workflow against `config`.
pub fn run_workflow(name: &str, config: &FlowConfig) -> Result<WorkflowResult> {
    let registry = default_registry();
    build_workflow(&registry, name, config)?.execute()
}
