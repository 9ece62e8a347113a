use anyhow::Result;

use crate::config::FlowConfig;
use crate::pipeline::{StepSpec, Workflow, WorkflowContext};

pub const NAME: &str = "hello-world";
pub const SAY_HELLO: &str = "say_hello";

pub fn say_hello(name: &str) -> String {
    format!("Hello, {name}!")
}

pub struct HelloWorkflow {
    name: String,
}

impl HelloWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(config.hello.name.clone())
    }
}

impl Workflow for HelloWorkflow {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Greets a name"
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![StepSpec::new(SAY_HELLO)]
    }

    fn run(&self, ctx: &WorkflowContext) -> Result<String> {
        ctx.run_step(&StepSpec::new(SAY_HELLO), || Ok(say_hello(&self.name)))
    }
}
