// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dataset::{Entities, TrRegistry};
use crate::errors::MissingDataError;
use crate::observability::messages::engine::DatasetIndexed;
use crate::observability::messages::StructuredLog;

/// Selection applied when indexing a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetQuery {
    pub task: Option<String>,
    pub session: Option<String>,
    /// Subject labels to keep; empty keeps every subject.
    pub subjects: Vec<String>,
    /// Set when any pipeline uses AROMA; every recording then needs its AROMA variant.
    #[serde(skip)]
    pub require_aroma: bool,
}

/// Index of the recordings selected by a query.
///
/// `signals`, `aroma_signals`, `confounds` and `entities` are parallel lists; the
/// provider is responsible for keeping them aligned, the executor checks their lengths
/// before fanning out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetIndex {
    pub signals: Vec<PathBuf>,
    pub aroma_signals: Vec<Option<PathBuf>>,
    pub confounds: Vec<PathBuf>,
    pub entities: Vec<Entities>,
    pub tr_registry: TrRegistry,
}

/// Source of recordings, confound tables and repetition times.
pub trait DatasetProvider: Send + Sync {
    fn grab(&self, query: &DatasetQuery) -> Result<DatasetIndex, MissingDataError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    signal: PathBuf,
    #[serde(default)]
    aroma_signal: Option<PathBuf>,
    confounds: PathBuf,
    entities: Entities,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    repetition_times: BTreeMap<String, f64>,
    recordings: Vec<ManifestEntry>,
}

/// Dataset described by a YAML or JSON manifest.
///
/// ```yaml
/// repetition_times:
///   rest: 2.0
/// recordings:
///   - signal: sub-01/func/sub-01_task-rest_bold.json
///     aroma_signal: sub-01/func/sub-01_task-rest_desc-smoothAROMAnonaggr_bold.json
///     confounds: sub-01/func/sub-01_task-rest_desc-confounds_regressors.tsv
///     entities: {subject: "01", task: rest}
/// ```
///
/// Relative paths are resolved against the manifest's directory.
#[derive(Debug, Clone)]
pub struct ManifestDataset {
    root: PathBuf,
    manifest: Manifest,
}

impl ManifestDataset {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MissingDataError> {
        let path = path.as_ref();
        let manifest_error = |reason: String| MissingDataError::Manifest {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let manifest: Manifest = if is_json {
            serde_json::from_str(&content).map_err(|e| manifest_error(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| manifest_error(e.to_string()))?
        };

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { root, manifest })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn matches(query: &DatasetQuery, entities: &Entities) -> bool {
        let task_ok = query
            .task
            .as_deref()
            .map_or(true, |task| entities.task() == Some(task));
        let session_ok = query
            .session
            .as_deref()
            .map_or(true, |session| entities.session() == Some(session));
        let subject_ok = query.subjects.is_empty()
            || entities
                .subject()
                .is_some_and(|subject| query.subjects.iter().any(|s| s == subject));
        task_ok && session_ok && subject_ok
    }
}

impl DatasetProvider for ManifestDataset {
    fn grab(&self, query: &DatasetQuery) -> Result<DatasetIndex, MissingDataError> {
        for subject in &query.subjects {
            let known = self
                .manifest
                .recordings
                .iter()
                .any(|entry| entry.entities.subject() == Some(subject.as_str()));
            if !known {
                return Err(MissingDataError::UnknownEntity {
                    kind: "subject".to_string(),
                    value: subject.clone(),
                });
            }
        }

        let mut index = DatasetIndex::default();
        for (task, tr) in &self.manifest.repetition_times {
            index.tr_registry.insert(task, *tr);
        }

        for entry in &self.manifest.recordings {
            if !Self::matches(query, &entry.entities) {
                continue;
            }

            let signal = self.resolve(&entry.signal);
            if !signal.exists() {
                return Err(MissingDataError::Recording(signal));
            }

            let confounds = self.resolve(&entry.confounds);
            if !confounds.exists() {
                return Err(MissingDataError::ConfoundTable {
                    recording: signal,
                    expected: confounds,
                });
            }

            let aroma = entry.aroma_signal.as_deref().map(|p| self.resolve(p));
            let aroma = match aroma {
                Some(path) if path.exists() => Some(path),
                _ if query.require_aroma => {
                    return Err(MissingDataError::AromaVariant { recording: signal })
                }
                _ => None,
            };

            index.signals.push(signal);
            index.aroma_signals.push(aroma);
            index.confounds.push(confounds);
            index.entities.push(entry.entities.clone());
        }

        DatasetIndexed {
            recordings: index.signals.len(),
            tasks: self.manifest.repetition_times.len(),
        }
        .log();

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(with_aroma: bool) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        for sub in ["01", "02"] {
            fs::write(dir.path().join(format!("sub-{}_bold.json", sub)), "{}").unwrap();
            fs::write(dir.path().join(format!("sub-{}_confounds.tsv", sub)), "csf\n1\n").unwrap();
        }
        if with_aroma {
            fs::write(dir.path().join("sub-01_aroma.json"), "{}").unwrap();
        }
        let manifest = r#"
repetition_times:
  rest: 2.0
recordings:
  - signal: sub-01_bold.json
    aroma_signal: sub-01_aroma.json
    confounds: sub-01_confounds.tsv
    entities: {subject: "01", task: rest}
  - signal: sub-02_bold.json
    confounds: sub-02_confounds.tsv
    entities: {subject: "02", task: rest}
"#;
        let path = dir.path().join("dataset.yaml");
        fs::write(&path, manifest).unwrap();
        (dir, path)
    }

    #[test]
    fn test_grab_returns_parallel_lists() {
        let (dir, path) = fixture(true);
        let dataset = ManifestDataset::open(&path).unwrap();

        let index = dataset.grab(&DatasetQuery::default()).unwrap();

        assert_eq!(index.signals.len(), 2);
        assert_eq!(index.confounds.len(), 2);
        assert_eq!(index.entities.len(), 2);
        assert_eq!(index.aroma_signals, vec![Some(dir.path().join("sub-01_aroma.json")), None]);
        assert_eq!(index.tr_registry.get("rest"), Some(2.0));
        assert_eq!(index.entities[1].label(), "sub-02_task-rest");
    }

    #[test]
    fn test_grab_filters_by_subject() {
        let (_dir, path) = fixture(false);
        let dataset = ManifestDataset::open(&path).unwrap();
        let query = DatasetQuery {
            subjects: vec!["02".to_string()],
            ..Default::default()
        };

        let index = dataset.grab(&query).unwrap();
        assert_eq!(index.signals.len(), 1);
        assert_eq!(index.entities[0].subject(), Some("02"));

        let query = DatasetQuery {
            subjects: vec!["99".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            dataset.grab(&query),
            Err(MissingDataError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn test_required_aroma_variant_missing() {
        let (_dir, path) = fixture(true);
        let dataset = ManifestDataset::open(&path).unwrap();
        let query = DatasetQuery {
            require_aroma: true,
            ..Default::default()
        };
        assert!(matches!(
            dataset.grab(&query),
            Err(MissingDataError::AromaVariant { .. })
        ));
    }

    #[test]
    fn test_missing_confound_table() {
        let (dir, path) = fixture(false);
        fs::remove_file(dir.path().join("sub-02_confounds.tsv")).unwrap();
        let dataset = ManifestDataset::open(&path).unwrap();
        assert!(matches!(
            dataset.grab(&DatasetQuery::default()),
            Err(MissingDataError::ConfoundTable { .. })
        ));
    }
}
