use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::FlowConfig;
use crate::manifest::is_valid_service_name;
use crate::ml::dataset::subset_dir;
use crate::pipeline::WorkflowRegistry;
use crate::resources::{check_requests_within_limits, check_resources};

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_config(config: &FlowConfig, registry: &WorkflowRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.version != 1 {
        report
            .errors
            .push(format!("Unsupported config version: {}", config.version));
    }

    if config.work_dir.as_os_str().is_empty() {
        report.errors.push("Work directory cannot be empty".into());
    }

    report
        .errors
        .extend(check_resources("Step resources", &config.step_resources));
    report.merge(validate_training(config));
    report.merge(validate_manifest(config));

    for name in registry.known_workflows() {
        if let Err(err) = registry.create(&name, config) {
            report.errors.push(format!(
                "Workflow '{name}' cannot be built from this config: {err}"
            ));
        }
    }

    report
}

fn validate_training(config: &FlowConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let training = &config.training;

    let distinct: BTreeSet<&str> = training
        .categories
        .iter()
        .map(String::as_str)
        .filter(|category| !category.trim().is_empty())
        .collect();
    if distinct.len() < 2 {
        report.errors.push(format!(
            "Training needs at least two distinct categories, got {}",
            distinct.len()
        ));
    }
    for (idx, category) in training.categories.iter().enumerate() {
        if category.trim().is_empty() {
            report
                .errors
                .push(format!("Category {} is empty", idx + 1));
        } else if training.categories[..idx].contains(category) {
            report
                .warnings
                .push(format!("Category '{category}' is listed more than once"));
        }
    }

    if training.max_features == 0 {
        report
            .errors
            .push("max_features must be greater than zero".into());
    }

    let classifier = &training.classifier;
    if !(classifier.c.is_finite() && classifier.c > 0.0) {
        report
            .errors
            .push(format!("Classifier C must be positive, got {}", classifier.c));
    }
    if !(classifier.learning_rate.is_finite() && classifier.learning_rate > 0.0) {
        report.errors.push(format!(
            "Classifier learning_rate must be positive, got {}",
            classifier.learning_rate
        ));
    }
    if classifier.max_iter == 0 {
        report
            .errors
            .push("Classifier max_iter must be greater than zero".into());
    }

    for (label, file) in [
        ("model_file", &training.model_file),
        ("vectorizer_file", &training.vectorizer_file),
    ] {
        if file.trim().is_empty() {
            report.errors.push(format!("{label} cannot be empty"));
        }
    }
    if training.model_file == training.vectorizer_file {
        report
            .errors
            .push("model_file and vectorizer_file must differ".into());
    }

    let corpus = subset_dir(&training.data_home, training.subset);
    if !corpus.is_dir() {
        report.warnings.push(format!(
            "Corpus directory {} does not exist; the model-deployment workflow will fail",
            corpus.display()
        ));
    }

    report
}

fn validate_manifest(config: &FlowConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let manifest = &config.manifest;

    if !is_valid_service_name(&manifest.service_name) {
        report.errors.push(format!(
            "Service name '{}' is not a valid DNS-1035 label",
            manifest.service_name
        ));
    }

    if manifest.storage_uri.trim().is_empty() {
        report.errors.push("Storage URI cannot be empty".into());
    } else if !manifest.storage_uri.contains("://") {
        report.warnings.push(format!(
            "Storage URI '{}' has no scheme",
            manifest.storage_uri
        ));
    } else if manifest.storage_uri.contains("your-bucket") {
        report
            .warnings
            .push("Storage URI still points at the placeholder bucket".into());
    }

    report
        .errors
        .extend(check_resources("Manifest requests", &manifest.requests));
    report
        .errors
        .extend(check_resources("Manifest limits", &manifest.limits));
    report.errors.extend(check_requests_within_limits(
        &manifest.requests,
        &manifest.limits,
    ));

    if manifest.file.trim().is_empty() {
        report.errors.push("Manifest file name cannot be empty".into());
    }
    if [&config.training.model_file, &config.training.vectorizer_file].contains(&&manifest.file) {
        report
            .errors
            .push("Manifest file name collides with a training artifact".into());
    }

    report
}
