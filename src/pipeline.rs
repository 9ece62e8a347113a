use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::config::FlowConfig;
use crate::observability::MetricsCollector;

/// Handle to a file produced by one step and handed to the next.
///
/// Handles are not `Clone`. A consuming step takes the handle by value, so an
/// artifact is consumed at most once per run.
#[derive(Debug, PartialEq, Eq)]
pub struct ArtifactFile {
    path: PathBuf,
}

impl ArtifactFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Size in bytes, or `None` when the file is missing.
    pub fn size_bytes(&self) -> Option<u64> {
        fs::metadata(&self.path).ok().map(|meta| meta.len())
    }

    pub fn is_non_empty(&self) -> bool {
        self.size_bytes().is_some_and(|len| len > 0)
    }

    pub fn sha256(&self) -> Result<String> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open artifact: {}", self.path.display()))?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        loop {
            let read = reader
                .read(&mut buffer)
                .with_context(|| format!("Failed to read artifact: {}", self.path.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Declarative CPU/memory sizing attached to a step. Never enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub cpu: String,
    pub memory: String,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            cpu: "1".to_string(),
            memory: "1Gi".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
}

impl StepSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: None,
        }
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = Some(resources);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducedArtifact {
    pub step: String,
    pub path: PathBuf,
}

/// Everything a running workflow may touch besides its own step outputs.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    work_dir: PathBuf,
    metrics: MetricsCollector,
    artifacts: Arc<Mutex<Vec<ProducedArtifact>>>,
}

impl WorkflowContext {
    pub fn new(work_dir: impl Into<PathBuf>, metrics: MetricsCollector) -> Self {
        Self {
            work_dir: work_dir.into(),
            metrics,
            artifacts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Runs one step inside its own span and metrics timer.
    pub fn run_step<T, F>(&self, step: &StepSpec, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let span = tracing::span!(tracing::Level::DEBUG, "step", step = step.name.as_str());
        let _span_guard = span.enter();
        let _timer = self.metrics.start_step(&step.name);
        if let Some(resources) = &step.resources {
            tracing::debug!(cpu = %resources.cpu, memory = %resources.memory, "Dispatching step");
        } else {
            tracing::debug!("Dispatching step");
        }
        f().map_err(|err| {
            self.metrics.record_step_failure();
            err.context(format!("step '{}' failed", step.name))
        })
    }

    pub fn record_artifact(&self, step: &str, artifact: &ArtifactFile) {
        if let Ok(mut guard) = self.artifacts.lock() {
            guard.push(ProducedArtifact {
                step: step.to_string(),
                path: artifact.path().to_path_buf(),
            });
        }
    }

    fn clear_artifacts(&self) {
        if let Ok(mut guard) = self.artifacts.lock() {
            guard.clear();
        }
    }

    pub fn artifacts(&self) -> Vec<ProducedArtifact> {
        self.artifacts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub trait Workflow: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Steps in execution order.
    fn steps(&self) -> Vec<StepSpec>;
    fn run(&self, ctx: &WorkflowContext) -> Result<String>;
}

type WorkflowConstructor = Arc<dyn Fn(&FlowConfig) -> Result<Box<dyn Workflow>> + Send + Sync>;

pub struct WorkflowRegistry {
    factories: HashMap<String, WorkflowConstructor>,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&FlowConfig) -> Result<Box<dyn Workflow>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(constructor));
    }

    pub fn create(&self, name: &str, config: &FlowConfig) -> Result<Box<dyn Workflow>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "Unknown workflow '{}'. Available workflows: {}",
                name,
                self.known_workflows().join(", ")
            )
        })?;
        factory(config)
    }

    pub fn known_workflows(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

pub struct WorkflowExecutor {
    workflow: Box<dyn Workflow>,
    ctx: WorkflowContext,
    metrics: MetricsCollector,
}

impl WorkflowExecutor {
    pub fn new(workflow: Box<dyn Workflow>, work_dir: impl Into<PathBuf>) -> Self {
        let metrics = MetricsCollector::new();
        Self {
            workflow,
            ctx: WorkflowContext::new(work_dir, metrics.clone()),
            metrics,
        }
    }

    /// Records into `metrics` instead of the executor's own collector.
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.ctx = WorkflowContext::new(self.ctx.work_dir().to_path_buf(), metrics.clone());
        self.metrics = metrics;
        self
    }

    #[instrument(skip(self), fields(workflow = self.workflow.name()))]
    pub fn execute(&self) -> Result<WorkflowResult> {
        self.metrics.reset();
        self.ctx.clear_artifacts();
        let work_dir = self.ctx.work_dir();
        if !work_dir.as_os_str().is_empty() && !work_dir.exists() {
            fs::create_dir_all(work_dir).with_context(|| {
                format!("Failed to create work directory: {}", work_dir.display())
            })?;
        }

        let total_start = Instant::now();
        let outcome = self.workflow.run(&self.ctx);
        self.metrics.record_total_duration(total_start.elapsed());

        match outcome {
            Ok(output) => {
                self.metrics.record_run(true);
                info!(
                    workflow = self.workflow.name(),
                    steps = self.workflow.steps().len(),
                    "Workflow completed"
                );
                Ok(WorkflowResult {
                    workflow: self.workflow.name().to_string(),
                    output,
                    steps: self.workflow.steps(),
                    artifacts: self.ctx.artifacts(),
                })
            }
            Err(err) => {
                self.metrics.record_run(false);
                Err(err.context(format!("workflow '{}' failed", self.workflow.name())))
            }
        }
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub workflow: String,
    pub output: String,
    pub steps: Vec<StepSpec>,
    pub artifacts: Vec<ProducedArtifact>,
}

pub fn build_workflow(
    registry: &WorkflowRegistry,
    name: &str,
    config: &FlowConfig,
) -> Result<WorkflowExecutor> {
    let workflow = registry.create(name, config)?;
    Ok(WorkflowExecutor::new(workflow, config.work_dir.clone()))
}
