use anyhow::Result;
use serveflow::FlowConfig;
use serveflow::observability::init_tracing;
use serveflow::workflows::{model_deployment, run_workflow};

fn main() -> Result<()> {
    init_tracing(None)?;
    let config = FlowConfig::resolve(None)?;
    let result = run_workflow(model_deployment::NAME, &config)?;
    println!("{}", result.output);
    Ok(())
}
