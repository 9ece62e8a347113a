//! KServe `InferenceService` document for the text classifier.

use serde::{Deserialize, Serialize};

use crate::config::ManifestConfig;
use crate::pipeline::Resources;

pub const API_VERSION: &str = "serving.kserve.io/v1beta1";
pub const KIND: &str = "InferenceService";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceService {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: InferenceServiceSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceServiceSpec {
    pub predictor: PredictorSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSpec {
    pub sklearn: ModelSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub storage_uri: String,
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub requests: Resources,
    pub limits: Resources,
}

impl InferenceService {
    pub fn from_config(config: &ManifestConfig) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ObjectMeta {
                name: config.service_name.clone(),
            },
            spec: InferenceServiceSpec {
                predictor: PredictorSpec {
                    sklearn: ModelSpec {
                        storage_uri: config.storage_uri.clone(),
                        resources: ResourceRequirements {
                            requests: config.requests.clone(),
                            limits: config.limits.clone(),
                        },
                    },
                },
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

/// Renders the manifest text for `config`.
pub fn render_manifest(config: &ManifestConfig) -> Result<String, serde_yaml::Error> {
    InferenceService::from_config(config).to_yaml()
}

/// Checks a service name against the Kubernetes DNS-1035 label rules.
pub fn is_valid_service_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes[0].is_ascii_lowercase()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[bytes.len() - 1] != b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_keeps_quoted_quantities() {
        let yaml = render_manifest(&ManifestConfig::default()).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let requests = &value["spec"]["predictor"]["sklearn"]["resources"]["requests"];
        assert_eq!(requests["cpu"].as_str(), Some("1"));
        assert_eq!(requests["memory"].as_str(), Some("1Gi"));
        assert_eq!(value["apiVersion"].as_str(), Some(API_VERSION));
        assert_eq!(
            value["spec"]["predictor"]["sklearn"]["storageUri"].as_str(),
            Some("s3://your-bucket/models/text-classifier")
        );
    }

    #[test]
    fn service_names() {
        assert!(is_valid_service_name("text-classifier"));
        assert!(!is_valid_service_name("Text-Classifier"));
        assert!(!is_valid_service_name("1classifier"));
        assert!(!is_valid_service_name("classifier-"));
        assert!(!is_valid_service_name(""));
    }
}
