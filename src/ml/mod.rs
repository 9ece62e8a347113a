//! Toy text classification: corpus loading, TF-IDF features and a logistic
//! regression classifier, plus the JSON artifact format they are stored in.

pub mod classifier;
pub mod dataset;
pub mod logistic;
pub mod tfidf;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use classifier::{ModelArtifact, Prediction, TextClassifier};
pub use dataset::{Dataset, DatasetError, load_newsgroups};
pub use logistic::LogisticRegression;
pub use tfidf::{SparseRow, TfidfVectorizer};

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),
    #[error("empty vocabulary: documents contain no tokens")]
    EmptyVocabulary,
    #[error("no training samples")]
    NoSamples,
    #[error("got {samples} samples but {targets} targets")]
    LengthMismatch { samples: usize, targets: usize },
    #[error("training data needs at least two classes, found {0}")]
    SingleClass(usize),
    #[error("inconsistent {0}: {1}")]
    Inconsistent(&'static str, String),
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope<T> {
    kind: String,
    version: u32,
    created_at: DateTime<Utc>,
    payload: T,
}

/// Writes `payload` as a tagged JSON document.
pub fn save_artifact<T: Serialize>(kind: &str, payload: &T, path: &Path) -> Result<()> {
    let envelope = ArtifactEnvelope {
        kind: kind.to_string(),
        version: ARTIFACT_VERSION,
        created_at: Utc::now(),
        payload,
    };
    let file = File::create(path)
        .with_context(|| format!("Failed to create artifact: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &envelope)
        .with_context(|| format!("Failed to serialize {kind} artifact: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
    Ok(())
}

/// Reads a document written by [`save_artifact`], checking its kind and version.
pub fn load_artifact<T: DeserializeOwned>(kind: &str, path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open artifact: {}", path.display()))?;
    let envelope: ArtifactEnvelope<T> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse artifact: {}", path.display()))?;
    if envelope.kind != kind {
        bail!(
            "Artifact {} holds a '{}' but a '{}' was expected",
            path.display(),
            envelope.kind,
            kind
        );
    }
    if envelope.version != ARTIFACT_VERSION {
        bail!(
            "Unsupported artifact version {} in {}",
            envelope.version,
            path.display()
        );
    }
    Ok(envelope.payload)
}
