use indexmap::IndexMap;
use ndarray::ArrayD;
use picdeck_core::{BASELINE_FORMAT_VERSION, Tolerance};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::atomic::write_atomic;
use crate::error::{Result, StoreError};

/// Accepted reference value for one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub value: ArrayD<f64>,
    /// Tolerance in force when the value was accepted
    pub tolerance: Option<Tolerance>,
    /// Run that produced the value
    pub run_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize)]
struct BaselineFile {
    format_version: u32,
    entries: IndexMap<String, BaselineEntry>,
}

/// Label-keyed baselines, kept in first-recorded order
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
    entries: IndexMap<String, BaselineEntry>,
}

impl BaselineStore {
    /// Load baselines from `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty(path));
        }
        let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let file: BaselineFile = bincode::deserialize(&bytes).map_err(|e| StoreError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if file.format_version != BASELINE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: file.format_version,
                expected: BASELINE_FORMAT_VERSION,
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries: file.entries,
        })
    }

    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: IndexMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, label: &str) -> Option<&BaselineEntry> {
        self.entries.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `entry` under `label` and persist the whole file.
    /// Re-recording a label keeps its original position.
    pub fn record(&mut self, label: &str, entry: BaselineEntry) -> Result<()> {
        let shape = entry.value.shape().to_vec();
        let previous = self.entries.insert(label.to_string(), entry);
        if let Err(e) = self.save() {
            // keep memory and disk in agreement
            match previous {
                Some(old) => {
                    self.entries.insert(label.to_string(), old);
                }
                None => {
                    self.entries.shift_remove(label);
                }
            }
            return Err(e);
        }
        info!(
            label,
            ?shape,
            replaced = previous.is_some(),
            path = %self.path.display(),
            "baseline recorded"
        );
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let file = BaselineFile {
            format_version: BASELINE_FORMAT_VERSION,
            entries: self.entries.clone(),
        };
        let bytes = bincode::serialize(&file).map_err(|e| StoreError::Encode(e.to_string()))?;
        write_atomic(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use tempfile::TempDir;

    fn entry(values: &[f64]) -> BaselineEntry {
        BaselineEntry {
            value: arr1(values).into_dyn(),
            tolerance: Some(Tolerance::absolute(1e-7)),
            run_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::open(&dir.path().join("references").join("run.bin")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn records_persist_in_first_appearance_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("references").join("run.bin");

        let mut store = BaselineStore::open(&path).unwrap();
        store.record("Ex", entry(&[1.0])).unwrap();
        store.record("Utot", entry(&[2.0])).unwrap();
        store.record("Ex", entry(&[3.0])).unwrap();

        let reopened = BaselineStore::open(&path).unwrap();
        assert_eq!(reopened.labels().collect::<Vec<_>>(), vec!["Ex", "Utot"]);
        assert_eq!(reopened.get("Ex").unwrap().value, arr1(&[3.0]).into_dyn());
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.bin");
        fs::write(&path, [0xffu8; 3]).unwrap();
        assert!(matches!(
            BaselineStore::open(&path),
            Err(StoreError::Decode { .. })
        ));
    }
}
