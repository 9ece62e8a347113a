use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::logistic::argmax;
use super::{Dataset, LogisticRegression, ModelError, TfidfVectorizer, load_artifact, save_artifact};
use crate::config::ClassifierConfig;

pub const MODEL_KIND: &str = "logistic-regression";
pub const VECTORIZER_KIND: &str = "tfidf-vectorizer";

/// Fitted estimator plus the names of the classes it predicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub target_names: Vec<String>,
    pub estimator: LogisticRegression,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub probability: f64,
}

#[derive(Debug, Clone)]
pub struct TextClassifier {
    vectorizer: TfidfVectorizer,
    model: ModelArtifact,
}

impl TextClassifier {
    pub fn train(
        dataset: &Dataset,
        max_features: usize,
        config: &ClassifierConfig,
    ) -> Result<Self, ModelError> {
        let mut vectorizer = TfidfVectorizer::new(Some(max_features));
        let features = vectorizer.fit_transform(&dataset.documents)?;
        let mut estimator = LogisticRegression::new(config);
        estimator.fit(&features, &dataset.targets, vectorizer.n_features())?;
        Ok(Self {
            vectorizer,
            model: ModelArtifact {
                target_names: dataset.target_names.clone(),
                estimator,
            },
        })
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn model(&self) -> &ModelArtifact {
        &self.model
    }

    pub fn save(&self, model_path: &Path, vectorizer_path: &Path) -> Result<()> {
        save_artifact(MODEL_KIND, &self.model, model_path)?;
        save_artifact(VECTORIZER_KIND, &self.vectorizer, vectorizer_path)?;
        Ok(())
    }

    pub fn load(model_path: &Path, vectorizer_path: &Path) -> Result<Self> {
        let model: ModelArtifact = load_artifact(MODEL_KIND, model_path)?;
        let vectorizer: TfidfVectorizer = load_artifact(VECTORIZER_KIND, vectorizer_path)?;
        vectorizer
            .check_consistency()
            .with_context(|| format!("Corrupt vectorizer: {}", vectorizer_path.display()))?;
        model
            .estimator
            .check_consistency()
            .with_context(|| format!("Corrupt model: {}", model_path.display()))?;
        if model
            .estimator
            .classes()
            .iter()
            .any(|&class| class >= model.target_names.len())
        {
            bail!(
                "Model {} predicts classes beyond its {} target names",
                model_path.display(),
                model.target_names.len()
            );
        }
        if model.estimator.n_features() != vectorizer.n_features() {
            bail!(
                "Model expects {} features but the vectorizer produces {}",
                model.estimator.n_features(),
                vectorizer.n_features()
            );
        }
        Ok(Self { vectorizer, model })
    }

    pub fn predict<S: AsRef<str>>(&self, documents: &[S]) -> Result<Vec<Prediction>, ModelError> {
        let features = self.vectorizer.transform(documents)?;
        let probabilities = self.model.estimator.predict_proba(&features)?;
        let classes = self.model.estimator.classes();
        Ok(probabilities
            .iter()
            .map(|row| {
                let best = argmax(row);
                let label = self
                    .model
                    .target_names
                    .get(classes[best])
                    .cloned()
                    .unwrap_or_else(|| classes[best].to_string());
                Prediction {
                    label,
                    probability: row[best],
                }
            })
            .collect())
    }

    /// Fraction of `dataset` documents whose predicted label matches.
    pub fn accuracy(&self, dataset: &Dataset) -> Result<f64, ModelError> {
        if dataset.is_empty() {
            return Err(ModelError::NoSamples);
        }
        let features = self.vectorizer.transform(&dataset.documents)?;
        let predicted = self.model.estimator.predict(&features)?;
        let correct = predicted
            .iter()
            .zip(&dataset.targets)
            .filter(|(p, t)| p == t)
            .count();
        Ok(correct as f64 / dataset.len() as f64)
    }
}
