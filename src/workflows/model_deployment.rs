use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{FlowConfig, ManifestConfig, TrainingConfig};
use crate::manifest::render_manifest;
use crate::ml::{TextClassifier, load_newsgroups};
use crate::pipeline::{ArtifactFile, Resources, StepSpec, Workflow, WorkflowContext};

pub const NAME: &str = "model-deployment";
pub const TRAIN_MODEL: &str = "train_model";
pub const CREATE_KSERVE_MANIFEST: &str = "create_kserve_manifest";
pub const DEPLOY_MODEL: &str = "deploy_model";

pub const DEPLOYMENT_STATUS: &str = "Model deployed successfully to KServe";

/// Outputs of the training step, consumed together by the manifest step.
#[derive(Debug)]
pub struct TrainedArtifacts {
    pub model: ArtifactFile,
    pub vectorizer: ArtifactFile,
}

/// Fits the TF-IDF vectorizer and classifier on the configured corpus and
/// writes both to `out_dir`.
pub fn train_model(config: &TrainingConfig, out_dir: &Path) -> Result<TrainedArtifacts> {
    let dataset = load_newsgroups(&config.data_home, config.subset, &config.categories)
        .with_context(|| {
            format!(
                "Failed to load {} corpus from {}",
                config.subset,
                config.data_home.display()
            )
        })?;
    info!(
        documents = dataset.len(),
        categories = ?dataset.target_names,
        "Corpus loaded"
    );

    let classifier = TextClassifier::train(&dataset, config.max_features, &config.classifier)
        .context("Failed to fit text classifier")?;
    let accuracy = classifier
        .accuracy(&dataset)
        .context("Failed to score text classifier")?;
    info!(
        features = classifier.vectorizer().n_features(),
        iterations = ?classifier.model().estimator.n_iter(),
        training_accuracy = accuracy,
        "Classifier fitted"
    );

    let model = ArtifactFile::new(out_dir.join(&config.model_file));
    let vectorizer = ArtifactFile::new(out_dir.join(&config.vectorizer_file));
    classifier.save(model.path(), vectorizer.path())?;

    Ok(TrainedArtifacts { model, vectorizer })
}

/// Writes the KServe manifest for the classifier.
///
/// The artifact handles are taken but their locations are not written into
/// the manifest; `storageUri` always comes from `config`.
pub fn create_kserve_manifest(
    model_file: ArtifactFile,
    vectorizer_file: ArtifactFile,
    config: &ManifestConfig,
    out_dir: &Path,
) -> Result<ArtifactFile> {
    warn!(
        model = %model_file.path().display(),
        vectorizer = %vectorizer_file.path().display(),
        storage_uri = %config.storage_uri,
        "Manifest does not reference the trained artifacts; storageUri is taken from configuration"
    );

    let rendered = render_manifest(config).context("Failed to render KServe manifest")?;
    let manifest = ArtifactFile::new(out_dir.join(&config.file));
    fs::write(manifest.path(), rendered).with_context(|| {
        format!("Failed to write manifest: {}", manifest.path().display())
    })?;
    info!(
        manifest = %manifest.path().display(),
        service = %config.service_name,
        "KServe manifest written"
    );
    Ok(manifest)
}

/// Stand-in for applying the manifest to a cluster. Always succeeds.
pub fn deploy_model(manifest: ArtifactFile) -> String {
    info!(
        manifest = %manifest.path().display(),
        "Deployment stubbed; no cluster interaction"
    );
    DEPLOYMENT_STATUS.to_string()
}

pub struct ModelDeploymentWorkflow {
    training: TrainingConfig,
    manifest: ManifestConfig,
    resources: Resources,
}

impl ModelDeploymentWorkflow {
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            training: config.training.clone(),
            manifest: config.manifest.clone(),
            resources: config.step_resources.clone(),
        }
    }

    fn step(&self, name: &str) -> StepSpec {
        StepSpec::new(name).with_resources(self.resources.clone())
    }
}

impl Workflow for ModelDeploymentWorkflow {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Trains a text classifier, writes its KServe manifest and deploys it"
    }

    fn steps(&self) -> Vec<StepSpec> {
        vec![
            self.step(TRAIN_MODEL),
            self.step(CREATE_KSERVE_MANIFEST),
            self.step(DEPLOY_MODEL),
        ]
    }

    fn run(&self, ctx: &WorkflowContext) -> Result<String> {
        let out_dir = ctx.work_dir();

        let trained = ctx.run_step(&self.step(TRAIN_MODEL), || {
            train_model(&self.training, out_dir)
        })?;
        ctx.record_artifact(TRAIN_MODEL, &trained.model);
        ctx.record_artifact(TRAIN_MODEL, &trained.vectorizer);

        let TrainedArtifacts { model, vectorizer } = trained;
        let manifest = ctx.run_step(&self.step(CREATE_KSERVE_MANIFEST), || {
            create_kserve_manifest(model, vectorizer, &self.manifest, out_dir)
        })?;
        ctx.record_artifact(CREATE_KSERVE_MANIFEST, &manifest);

        ctx.run_step(&self.step(DEPLOY_MODEL), || Ok(deploy_model(manifest)))
    }
}
