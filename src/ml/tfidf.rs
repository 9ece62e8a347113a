use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Sparse feature row as `(feature index, value)` pairs sorted by index.
pub type SparseRow = Vec<(usize, f64)>;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: Option<usize>,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(max_features: Option<usize>) -> Self {
        Self {
            max_features,
            ..Self::default()
        }
    }

    /// Lowercases and splits on runs of two or more word characters.
    pub fn tokenize(document: &str) -> Vec<String> {
        let lowered = document.to_lowercase();
        TOKEN_PATTERN
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Checks that every vocabulary index has an idf weight.
    pub fn check_consistency(&self) -> Result<(), ModelError> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(ModelError::Inconsistent(
                "TfidfVectorizer",
                format!(
                    "{} idf weights for {} terms",
                    self.idf.len(),
                    self.vocabulary.len()
                ),
            ));
        }
        if let Some((term, index)) = self
            .vocabulary
            .iter()
            .find(|(_, index)| **index >= self.idf.len())
        {
            return Err(ModelError::Inconsistent(
                "TfidfVectorizer",
                format!("term '{term}' maps to out-of-range index {index}"),
            ));
        }
        Ok(())
    }

    /// Learns the vocabulary and smooth idf weights.
    ///
    /// With a feature cap, the terms with the highest total count across the
    /// corpus are kept, ties broken alphabetically. Indices are assigned in
    /// alphabetical order of the kept terms.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<(), ModelError> {
        if documents.is_empty() {
            return Err(ModelError::NoSamples);
        }

        // term -> (corpus count, document frequency)
        let mut stats: HashMap<String, (u64, u64)> = HashMap::new();
        for document in documents {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for token in Self::tokenize(document.as_ref()) {
                *counts.entry(token).or_default() += 1;
            }
            for (term, count) in counts {
                let entry = stats.entry(term).or_default();
                entry.0 += count;
                entry.1 += 1;
            }
        }
        if stats.is_empty() {
            return Err(ModelError::EmptyVocabulary);
        }

        let mut ranked: Vec<(String, u64, u64)> = stats
            .into_iter()
            .map(|(term, (count, df))| (term, count, df))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(limit) = self.max_features {
            ranked.truncate(limit);
        }
        ranked.sort_by(|a, b| a.0.cmp(&b.0));

        let n_documents = documents.len() as f64;
        self.vocabulary = BTreeMap::new();
        self.idf = Vec::with_capacity(ranked.len());
        for (index, (term, _, df)) in ranked.into_iter().enumerate() {
            self.idf
                .push(((1.0 + n_documents) / (1.0 + df as f64)).ln() + 1.0);
            self.vocabulary.insert(term, index);
        }
        Ok(())
    }

    /// Maps documents to L2-normalised tf-idf rows. Unknown terms are dropped.
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<Vec<SparseRow>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted("TfidfVectorizer"));
        }

        Ok(documents
            .iter()
            .map(|document| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for token in Self::tokenize(document.as_ref()) {
                    if let Some(&index) = self.vocabulary.get(&token) {
                        *counts.entry(index).or_default() += 1.0;
                    }
                }
                let mut row: SparseRow = counts
                    .into_iter()
                    .map(|(index, count)| (index, count * self.idf[index]))
                    .collect();
                let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, value) in &mut row {
                        *value /= norm;
                    }
                }
                row
            })
            .collect())
    }

    pub fn fit_transform<S: AsRef<str>>(
        &mut self,
        documents: &[S],
    ) -> Result<Vec<SparseRow>, ModelError> {
        self.fit(documents)?;
        self.transform(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_drops_single_characters() {
        assert_eq!(
            TfidfVectorizer::tokenize("A cat, a DOG & x-ray_2!"),
            vec!["cat", "dog", "ray_2"]
        );
    }

    #[test]
    fn feature_cap_keeps_most_frequent_terms() {
        let docs = ["alpha alpha beta", "alpha gamma gamma", "delta"];
        let mut vectorizer = TfidfVectorizer::new(Some(2));
        vectorizer.fit(&docs).unwrap();
        let terms: Vec<_> = vectorizer.vocabulary().keys().cloned().collect();
        assert_eq!(terms, vec!["alpha", "gamma"]);
        assert_eq!(vectorizer.vocabulary()["alpha"], 0);
        assert_eq!(vectorizer.vocabulary()["gamma"], 1);
    }

    #[test]
    fn rows_are_unit_length() {
        let docs = ["the quick brown fox", "the lazy dog", "quick quick dog"];
        let mut vectorizer = TfidfVectorizer::new(None);
        let rows = vectorizer.fit_transform(&docs).unwrap();
        for row in rows {
            let norm: f64 = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
        // "the" appears in two of three documents: ln(4/3) + 1
        let the = vectorizer.vocabulary()["the"];
        assert!((vectorizer.idf()[the] - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn transform_requires_fit() {
        let vectorizer = TfidfVectorizer::new(None);
        assert_eq!(
            vectorizer.transform(&["text"]).unwrap_err(),
            ModelError::NotFitted("TfidfVectorizer")
        );
    }
}
