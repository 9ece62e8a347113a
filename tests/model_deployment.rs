mod common;

use std::fs;

use serveflow::config::{FlowConfig, ManifestConfig};
use serveflow::lockfile::build_run_lock;
use serveflow::manifest::{InferenceService, KIND};
use serveflow::ml::TextClassifier;
use serveflow::pipeline::{ArtifactFile, Workflow, build_workflow};
use serveflow::workflows::{
    DEPLOYMENT_STATUS, ModelDeploymentWorkflow, create_kserve_manifest, default_registry,
    deploy_model, model_deployment, run_workflow, train_model,
};
use tempfile::tempdir;

use common::scratch_config;

#[test]
fn training_twice_leaves_non_empty_artifacts() {
    let temp = tempdir().unwrap();
    let (config, work_dir) = scratch_config(temp.path());

    for _ in 0..2 {
        let trained = train_model(&config.training, &work_dir).unwrap();
        assert_eq!(trained.model.path(), work_dir.join("model.joblib"));
        assert_eq!(trained.vectorizer.path(), work_dir.join("vectorizer.joblib"));
        assert!(trained.model.exists() && trained.model.is_non_empty());
        assert!(trained.vectorizer.exists() && trained.vectorizer.is_non_empty());
    }
}

#[test]
fn trained_artifacts_classify_corpus_text() {
    let temp = tempdir().unwrap();
    let (config, work_dir) = scratch_config(temp.path());
    let trained = train_model(&config.training, &work_dir).unwrap();

    let classifier = TextClassifier::load(trained.model.path(), trained.vectorizer.path()).unwrap();
    let predictions = classifier
        .predict(&["scripture and prayer in church", "evidence and reason"])
        .unwrap();
    assert_eq!(predictions[0].label, "soc.religion.christian");
    assert_eq!(predictions[1].label, "alt.atheism");
}

#[test]
fn missing_corpus_fails_training() {
    let temp = tempdir().unwrap();
    let mut config = FlowConfig::default();
    config.training.data_home = temp.path().join("nowhere");

    let err = train_model(&config.training, temp.path()).unwrap_err();
    assert!(format!("{err:#}").contains("category directory not found"));
}

#[test]
fn manifest_ignores_its_input_handles() {
    let temp = tempdir().unwrap();
    let config = ManifestConfig::default();

    let first = create_kserve_manifest(
        ArtifactFile::new(temp.path().join("a/model.joblib")),
        ArtifactFile::new(temp.path().join("a/vectorizer.joblib")),
        &config,
        temp.path(),
    )
    .unwrap();
    let first_text = fs::read_to_string(first.path()).unwrap();

    let second = create_kserve_manifest(
        ArtifactFile::new("/elsewhere/other-model.bin"),
        ArtifactFile::new("/elsewhere/other-vectorizer.bin"),
        &config,
        temp.path(),
    )
    .unwrap();
    let second_text = fs::read_to_string(second.path()).unwrap();

    assert_eq!(first_text, second_text);
    assert!(!first_text.contains("model.joblib"));

    let value: serde_yaml::Value = serde_yaml::from_str(&first_text).unwrap();
    assert!(value.get("apiVersion").is_some());
    assert_eq!(value["kind"].as_str(), Some(KIND));
    let sklearn = &value["spec"]["predictor"]["sklearn"];
    assert_eq!(sklearn["resources"]["requests"]["cpu"].as_str(), Some("1"));
    assert_eq!(sklearn["resources"]["requests"]["memory"].as_str(), Some("1Gi"));
    assert_eq!(sklearn["resources"]["limits"]["cpu"].as_str(), Some("1"));
    assert_eq!(sklearn["resources"]["limits"]["memory"].as_str(), Some("1Gi"));

    let typed = InferenceService::from_yaml(&first_text).unwrap();
    assert_eq!(typed.metadata.name, "text-classifier");
}

#[test]
fn deploy_ignores_manifest_contents() {
    let temp = tempdir().unwrap();
    let real = temp.path().join("kserve-manifest.yaml");
    fs::write(&real, "not: [valid").unwrap();

    assert_eq!(deploy_model(ArtifactFile::new(real)), DEPLOYMENT_STATUS);
    assert_eq!(
        deploy_model(ArtifactFile::new("/does/not/exist.yaml")),
        "Model deployed successfully to KServe"
    );
}

#[test]
fn full_workflow_deploys_and_leaves_three_files() {
    let temp = tempdir().unwrap();
    let (config, work_dir) = scratch_config(temp.path());

    let result = run_workflow(model_deployment::NAME, &config).unwrap();
    assert_eq!(result.output, "Model deployed successfully to KServe");
    for file in ["model.joblib", "vectorizer.joblib", "kserve-manifest.yaml"] {
        let path = work_dir.join(file);
        assert!(path.is_file(), "{} should exist", path.display());
    }

    let steps: Vec<_> = result.artifacts.iter().map(|a| a.step.as_str()).collect();
    assert_eq!(steps, vec!["train_model", "train_model", "create_kserve_manifest"]);

    let lock = build_run_lock(&result, &config).unwrap();
    assert_eq!(lock.artifacts.len(), 3);
    assert!(lock.artifacts.iter().all(|a| a.sha256.len() == 64 && a.bytes > 0));
    assert_eq!(lock.result, DEPLOYMENT_STATUS);
}

#[test]
fn executor_records_one_call_per_step() {
    let temp = tempdir().unwrap();
    let (config, _) = scratch_config(temp.path());
    let registry = default_registry();
    let executor = build_workflow(&registry, model_deployment::NAME, &config).unwrap();

    executor.execute().unwrap();
    let snapshot = executor.metrics().snapshot();
    for step in ["train_model", "create_kserve_manifest", "deploy_model"] {
        assert_eq!(snapshot.steps[step].calls, 1, "step {step}");
    }
    assert_eq!(snapshot.runs_succeeded, 1);
    assert!(
        snapshot
            .to_prometheus()
            .contains("serveflow_step_calls_total{step=\"deploy_model\"} 1")
    );
}

#[test]
fn failed_training_stops_the_workflow() {
    let temp = tempdir().unwrap();
    let mut config = FlowConfig::default();
    config.work_dir = temp.path().join("work");
    config.training.data_home = temp.path().join("missing");
    let registry = default_registry();
    let executor = build_workflow(&registry, model_deployment::NAME, &config).unwrap();

    let err = executor.execute().unwrap_err();
    assert!(format!("{err:#}").contains("step 'train_model' failed"));
    assert!(!config.work_dir.join("kserve-manifest.yaml").exists());

    let snapshot = executor.metrics().snapshot();
    assert_eq!(snapshot.runs_failed, 1);
    assert_eq!(snapshot.step_failures, 1);
    assert!(!snapshot.steps.contains_key("deploy_model"));
}

#[test]
fn steps_carry_declared_resources() {
    let workflow = ModelDeploymentWorkflow::from_config(&FlowConfig::default());
    let steps = workflow.steps();
    let names: Vec<_> = steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["train_model", "create_kserve_manifest", "deploy_model"]
    );
    for step in steps {
        let resources = step.resources.expect("resources declared");
        assert_eq!(resources.cpu, "1");
        assert_eq!(resources.memory, "1Gi");
    }
}
