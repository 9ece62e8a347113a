use std::fs;
use std::path::{Path, PathBuf};

use glob::{GlobError, Pattern, PatternError, glob};
use thiserror::Error;
use tracing::debug;

use crate::config::Subset;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no categories requested")]
    NoCategories,
    #[error("category directory not found: {}", .0.display())]
    MissingCategory(PathBuf),
    #[error("no documents found for category '{0}'")]
    EmptyCategory(String),
    #[error("invalid document pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<GlobError> for DatasetError {
    fn from(err: GlobError) -> Self {
        let path = err.path().to_path_buf();
        DatasetError::Io {
            path,
            source: err.into_error(),
        }
    }
}

/// A labelled text corpus. `targets[i]` indexes into `target_names`.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub documents: Vec<String>,
    pub targets: Vec<usize>,
    pub target_names: Vec<String>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub fn subset_dir(data_home: &Path, subset: Subset) -> PathBuf {
    data_home.join(format!("20news-bydate-{}", subset.as_str()))
}

/// Loads the 20 Newsgroups "bydate" layout:
/// `<data_home>/20news-bydate-<subset>/<category>/<document>`.
///
/// Target names are the requested categories, sorted and deduplicated.
/// Documents are decoded as Latin-1 and read in path order.
pub fn load_newsgroups(
    data_home: &Path,
    subset: Subset,
    categories: &[String],
) -> Result<Dataset, DatasetError> {
    let mut target_names: Vec<String> = categories.to_vec();
    target_names.sort();
    target_names.dedup();
    if target_names.is_empty() {
        return Err(DatasetError::NoCategories);
    }

    let root = subset_dir(data_home, subset);
    let mut dataset = Dataset {
        target_names,
        ..Dataset::default()
    };

    for (target, category) in dataset.target_names.iter().enumerate() {
        let category_dir = root.join(category);
        if !category_dir.is_dir() {
            return Err(DatasetError::MissingCategory(category_dir));
        }

        let pattern = format!("{}/*", Pattern::escape(&category_dir.to_string_lossy()));
        let entries = glob(&pattern).map_err(|source| DatasetError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?;
            if path.is_file() {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(DatasetError::EmptyCategory(category.clone()));
        }
        paths.sort();

        debug!(category = %category, documents = paths.len(), "Loading category");
        for path in paths {
            let bytes = fs::read(&path).map_err(|source| DatasetError::Io {
                path: path.clone(),
                source,
            })?;
            dataset.documents.push(decode_latin1(&bytes));
            dataset.targets.push(target);
        }
    }

    Ok(dataset)
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_doc(root: &Path, category: &str, name: &str, body: &[u8]) {
        let dir = subset_dir(root, Subset::Train).join(category);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn targets_follow_sorted_categories() {
        let temp = tempdir().unwrap();
        write_doc(temp.path(), "sci.space", "1", b"orbit");
        write_doc(temp.path(), "rec.autos", "1", b"engine");
        write_doc(temp.path(), "rec.autos", "2", b"wheels");

        let categories = vec!["sci.space".to_string(), "rec.autos".to_string()];
        let dataset = load_newsgroups(temp.path(), Subset::Train, &categories).unwrap();

        assert_eq!(dataset.target_names, vec!["rec.autos", "sci.space"]);
        assert_eq!(dataset.documents, vec!["engine", "wheels", "orbit"]);
        assert_eq!(dataset.targets, vec![0, 0, 1]);
    }

    #[test]
    fn latin1_bytes_never_fail() {
        let temp = tempdir().unwrap();
        write_doc(temp.path(), "misc", "1", &[0x63, 0x61, 0x66, 0xe9]);
        let dataset = load_newsgroups(temp.path(), Subset::Train, &["misc".to_string()]).unwrap();
        assert_eq!(dataset.documents[0], "café");
    }

    #[test]
    fn missing_category_is_an_error() {
        let temp = tempdir().unwrap();
        write_doc(temp.path(), "present", "1", b"text");
        let err = load_newsgroups(
            temp.path(),
            Subset::Train,
            &["present".to_string(), "absent".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::MissingCategory(_)));
    }

    #[test]
    fn category_without_documents_is_an_error() {
        let temp = tempdir().unwrap();
        write_doc(temp.path(), "full", "1", b"text");
        let empty = subset_dir(temp.path(), Subset::Train).join("hollow");
        fs::create_dir_all(empty.join("nested")).unwrap();

        let err = load_newsgroups(
            temp.path(),
            Subset::Train,
            &["full".to_string(), "hollow".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::EmptyCategory(name) if name == "hollow"));
    }

    #[test]
    fn empty_request_is_an_error() {
        let temp = tempdir().unwrap();
        let err = load_newsgroups(temp.path(), Subset::Train, &[]).unwrap_err();
        assert!(matches!(err, DatasetError::NoCategories));
    }
}
