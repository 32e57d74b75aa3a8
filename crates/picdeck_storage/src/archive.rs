use ndarray::ArrayD;
use picdeck_core::{ARCHIVE_FORMAT_VERSION, DiagnosticKind, OutputKey, RESULT_ARCHIVE_FILE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::atomic::write_atomic;
use crate::error::{Result, StoreError};

/// Everything one diagnostic wrote at one timestep, by name.
/// Field grids and binning histograms are n-d arrays, tracked particles are
/// one 1-d column per quantity, scalars are 0-d arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub arrays: BTreeMap<String, ArrayD<f64>>,
}

impl Frame {
    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.arrays.get(name)
    }

    /// The only array in the frame, if there is exactly one
    pub fn single(&self) -> Option<(&str, &ArrayD<f64>)> {
        let mut iter = self.arrays.iter();
        match (iter.next(), iter.next()) {
            (Some((name, array)), None) => Some((name.as_str(), array)),
            _ => None,
        }
    }
}

/// Output series of one diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub key: OutputKey,
    /// Names of the array axes (grid or binning axes); empty for particles and scalars
    pub axes: Vec<String>,
    pub frames: BTreeMap<u64, Frame>,
}

impl DiagnosticRecord {
    pub fn timesteps(&self) -> Vec<u64> {
        self.frames.keys().copied().collect()
    }

    pub fn axis_position(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|a| a == name)
    }
}

/// What a finished engine run leaves on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultArchive {
    pub format_version: u32,
    pub run_id: Uuid,
    /// Set by the engine once the last step has been written
    pub completed: bool,
    pub records: Vec<DiagnosticRecord>,
}

impl ResultArchive {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            format_version: ARCHIVE_FORMAT_VERSION,
            run_id,
            completed: false,
            records: Vec::new(),
        }
    }

    /// Record for `key`, created with the given axis names if missing
    pub fn record_mut(&mut self, key: OutputKey, axes: &[&str]) -> &mut DiagnosticRecord {
        let position = match self.records.iter().position(|r| r.key == key) {
            Some(position) => position,
            None => {
                self.records.push(DiagnosticRecord {
                    key,
                    axes: axes.iter().map(|a| a.to_string()).collect(),
                    frames: BTreeMap::new(),
                });
                self.records.len() - 1
            }
        };
        &mut self.records[position]
    }

    pub fn push_array(&mut self, key: OutputKey, timestep: u64, name: &str, data: ArrayD<f64>) {
        self.record_mut(key, &[])
            .frames
            .entry(timestep)
            .or_default()
            .arrays
            .insert(name.to_string(), data);
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Write the archive; a directory target gets `results.bin` inside it
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let file = if path.is_dir() {
            path.join(RESULT_ARCHIVE_FILE)
        } else {
            path.to_path_buf()
        };
        let bytes = bincode::serialize(self).map_err(|e| StoreError::Encode(e.to_string()))?;
        write_atomic(&file, &bytes)?;
        Ok(file)
    }

    pub fn load(file: &Path) -> Result<Self> {
        let bytes = fs::read(file).map_err(|e| StoreError::io(file, e))?;
        let archive: ResultArchive =
            bincode::deserialize(&bytes).map_err(|e| StoreError::Decode {
                path: file.to_path_buf(),
                message: e.to_string(),
            })?;
        if archive.format_version != ARCHIVE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: file.to_path_buf(),
                found: archive.format_version,
                expected: ARCHIVE_FORMAT_VERSION,
            });
        }
        Ok(archive)
    }
}

/// Read-only handle on a completed run's results
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
    archive: ResultArchive,
}

impl ResultStore {
    /// Open an archive file, or a directory holding `results.bin`
    pub fn open(path: &Path) -> Result<Self> {
        let file = if path.is_dir() {
            path.join(RESULT_ARCHIVE_FILE)
        } else {
            path.to_path_buf()
        };
        if !file.is_file() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let archive = ResultArchive::load(&file)?;
        if !archive.completed {
            return Err(StoreError::Incomplete(file));
        }
        debug!(
            path = %file.display(),
            run_id = %archive.run_id,
            records = archive.records.len(),
            "result store opened"
        );
        Ok(Self { path: file, archive })
    }

    pub fn from_archive(path: PathBuf, archive: ResultArchive) -> Self {
        Self { path, archive }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.archive.run_id
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.archive.records
    }

    pub fn records_of_kind(&self, kind: DiagnosticKind) -> Vec<&DiagnosticRecord> {
        self.archive
            .records
            .iter()
            .filter(|r| r.key.kind == kind)
            .collect()
    }

    pub fn record(&self, key: OutputKey) -> Option<&DiagnosticRecord> {
        self.archive.records.iter().find(|r| r.key == key)
    }
}
