use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::FlowConfig;
use crate::pipeline::{ArtifactFile, StepSpec, WorkflowResult};

/// Record of one completed run: what ran, with which config, producing what.
#[derive(Debug, Serialize)]
pub struct RunLock {
    pub workflow: String,
    pub generated_at: DateTime<Utc>,
    pub config_hash: String,
    pub result: String,
    pub steps: Vec<StepSpec>,
    pub artifacts: Vec<ArtifactLock>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactLock {
    pub step: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

pub fn build_run_lock(result: &WorkflowResult, config: &FlowConfig) -> Result<RunLock> {
    let mut artifacts = Vec::with_capacity(result.artifacts.len());
    for produced in &result.artifacts {
        let handle = ArtifactFile::new(&produced.path);
        artifacts.push(ArtifactLock {
            step: produced.step.clone(),
            path: produced.path.clone(),
            bytes: handle.size_bytes().unwrap_or_default(),
            sha256: handle.sha256()?,
        });
    }

    Ok(RunLock {
        workflow: result.workflow.clone(),
        generated_at: Utc::now(),
        config_hash: hash_config(config)?,
        result: result.output.clone(),
        steps: result.steps.clone(),
        artifacts,
    })
}

pub fn write_run_lock(result: &WorkflowResult, config: &FlowConfig, path: &Path) -> Result<()> {
    let lock = build_run_lock(result, config)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create lockfile directory: {}", parent.display())
        })?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create lockfile: {}", path.display()))?;
    serde_yaml::to_writer(file, &lock)
        .with_context(|| format!("Failed to write lockfile: {}", path.display()))?;

    Ok(())
}

fn hash_config(config: &FlowConfig) -> Result<String> {
    let serialized = serde_json::to_vec(config).context("Failed to serialize config")?;
    let mut hasher = Sha256::new();
    hasher.update(serialized);
    Ok(format!("{:x}", hasher.finalize()))
}
