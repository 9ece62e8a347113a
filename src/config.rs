use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::Resources;

pub const CONFIG_ENV: &str = "SERVEFLOW_CONFIG";
pub const DATA_HOME_ENV: &str = "SERVEFLOW_DATA_HOME";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub version: u32,
    /// Directory every step writes its artifacts into.
    pub work_dir: PathBuf,
    /// Declarative sizing attached to each step of the deployment workflow.
    pub step_resources: Resources,
    pub hello: HelloConfig,
    pub training: TrainingConfig,
    pub manifest: ManifestConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            version: 1,
            work_dir: PathBuf::from("."),
            step_resources: Resources::default(),
            hello: HelloConfig::default(),
            training: TrainingConfig::default(),
            manifest: ManifestConfig::default(),
        }
    }
}

impl FlowConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: FlowConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config YAML: {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path` when given, else `$SERVEFLOW_CONFIG` when set, else defaults.
    /// `$SERVEFLOW_DATA_HOME` then replaces the corpus root.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => match std::env::var_os(CONFIG_ENV) {
                Some(from_env) if !from_env.is_empty() => Self::load(Path::new(&from_env))?,
                _ => Self::default(),
            },
        };
        Ok(config.with_data_home(std::env::var_os(DATA_HOME_ENV)))
    }

    fn with_data_home(mut self, data_home: Option<OsString>) -> Self {
        if let Some(data_home) = data_home.filter(|value| !value.is_empty()) {
            self.training.data_home = PathBuf::from(data_home);
        }
        self
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to render config YAML")
    }

    /// Writes the configuration as YAML, creating parent directories.
    pub fn write(&self, destination: &Path) -> Result<PathBuf> {
        let rendered = self.to_yaml()?;
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(destination, rendered)
            .with_context(|| format!("Failed to write config: {}", destination.display()))?;
        Ok(destination.to_path_buf())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloConfig {
    pub name: String,
}

impl Default for HelloConfig {
    fn default() -> Self {
        Self {
            name: "World".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    #[default]
    Train,
    Test,
}

impl Subset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Test => "test",
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Root holding `20news-bydate-<subset>/<category>/` directories.
    pub data_home: PathBuf,
    pub subset: Subset,
    pub categories: Vec<String>,
    pub max_features: usize,
    pub classifier: ClassifierConfig,
    pub model_file: String,
    pub vectorizer_file: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_home: PathBuf::from("data"),
            subset: Subset::Train,
            categories: vec![
                "alt.atheism".to_string(),
                "soc.religion.christian".to_string(),
            ],
            max_features: 1000,
            classifier: ClassifierConfig::default(),
            model_file: "model.joblib".to_string(),
            vectorizer_file: "vectorizer.joblib".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Inverse regularisation strength.
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tol: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            learning_rate: 1.0,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub service_name: String,
    pub storage_uri: String,
    pub requests: Resources,
    pub limits: Resources,
    pub file: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            service_name: "text-classifier".to_string(),
            storage_uri: "s3://your-bucket/models/text-classifier".to_string(),
            requests: Resources::default(),
            limits: Resources::default(),
            file: "kserve-manifest.yaml".to_string(),
        }
    }
}
