mod common;

use serveflow::config::FlowConfig;
use serveflow::pipeline::Resources;
use serveflow::validation::validate_config;
use serveflow::workflows::default_registry;
use tempfile::tempdir;

use common::scratch_config;

#[test]
fn scratch_config_passes_with_placeholder_warning() {
    let temp = tempdir().unwrap();
    let (config, _) = scratch_config(temp.path());
    let report = validate_config(&config, &default_registry());
    assert!(report.is_ok(), "unexpected errors: {:?}", report.errors);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("placeholder bucket"))
    );
}

#[test]
fn missing_corpus_is_only_a_warning() {
    let temp = tempdir().unwrap();
    let mut config = FlowConfig::default();
    config.training.data_home = temp.path().join("absent");
    let report = validate_config(&config, &default_registry());
    assert!(report.is_ok());
    assert!(report.warnings.iter().any(|w| w.contains("does not exist")));
}

#[test]
fn validation_catches_bad_training_settings() {
    let mut config = FlowConfig::default();
    config.version = 2;
    config.training.categories = vec!["alt.atheism".to_string()];
    config.training.max_features = 0;
    config.training.classifier.c = 0.0;
    config.training.vectorizer_file = config.training.model_file.clone();

    let report = validate_config(&config, &default_registry());
    assert!(!report.is_ok());
    let joined = report.errors.join("\n");
    assert!(joined.contains("Unsupported config version"));
    assert!(joined.contains("at least two distinct categories"));
    assert!(joined.contains("max_features"));
    assert!(joined.contains("Classifier C"));
    assert!(joined.contains("must differ"));
}

#[test]
fn validation_catches_bad_manifest_settings() {
    let mut config = FlowConfig::default();
    config.manifest.service_name = "Text_Classifier".to_string();
    config.manifest.requests = Resources {
        cpu: "2".to_string(),
        memory: "4Gi".to_string(),
    };
    config.manifest.limits.cpu = "lots".to_string();
    config.manifest.file = config.training.model_file.clone();

    let report = validate_config(&config, &default_registry());
    let joined = report.errors.join("\n");
    assert!(joined.contains("DNS-1035"));
    assert!(joined.contains("Invalid CPU quantity 'lots'"));
    assert!(joined.contains("Memory request '4Gi' exceeds limit '1Gi'"));
    assert!(joined.contains("collides"));
}

#[test]
fn repeated_category_does_not_count_twice() {
    let temp = tempdir().unwrap();
    let (mut config, _) = scratch_config(temp.path());
    config.training.categories = vec!["alt.atheism".to_string(), "alt.atheism".to_string()];

    let report = validate_config(&config, &default_registry());
    assert!(!report.is_ok());
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("at least two distinct categories, got 1"))
    );
    assert!(report.warnings.iter().any(|w| w.contains("more than once")));
}
