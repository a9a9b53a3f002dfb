use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::content::write_text_atomic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const PROGRESS_VERSION: u32 = 1;
pub const PROGRESS_FILE_NAME: &str = "progress.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressFile {
    pub version: u32,
    pub last_stage_index: usize,
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("read progress '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write progress '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode progress json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("{0}")]
    Decode(String),
    #[error("progress version mismatch: expected {expected}, got {actual}")]
    Version { expected: u32, actual: u32 },
}

/// Durable "last stage index" marker. Nothing else survives a restart.
pub trait ProgressStore {
    fn load(&self) -> Result<usize, ProgressError>;
    fn save(&mut self, last_stage_index: usize) -> Result<(), ProgressError>;
}

/// JSON file store. A missing file reads as stage 0.
#[derive(Debug, Clone)]
pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(save_dir: &Path) -> Self {
        Self::new(save_dir.join(PROGRESS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for JsonProgressStore {
    fn load(&self) -> Result<usize, ProgressError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "progress_file_missing");
                return Ok(0);
            }
            Err(source) => {
                return Err(ProgressError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let progress = parse_progress_json(&raw)?;
        if progress.version != PROGRESS_VERSION {
            return Err(ProgressError::Version {
                expected: PROGRESS_VERSION,
                actual: progress.version,
            });
        }
        Ok(progress.last_stage_index)
    }

    fn save(&mut self, last_stage_index: usize) -> Result<(), ProgressError> {
        let json = serde_json::to_string_pretty(&ProgressFile {
            version: PROGRESS_VERSION,
            last_stage_index,
        })
        .map_err(ProgressError::Encode)?;
        write_text_atomic(&self.path, &json).map_err(|source| ProgressError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(last_stage_index, path = %self.path.display(), "progress_saved");
        Ok(())
    }
}

pub fn parse_progress_json(raw: &str) -> Result<ProgressFile, ProgressError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, ProgressFile>(&mut deserializer) {
        Ok(progress) => Ok(progress),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(ProgressError::Decode(format!("parse progress json: {source}")))
            } else {
                Err(ProgressError::Decode(format!(
                    "parse progress json at {path}: {source}"
                )))
            }
        }
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryProgressStore;

#[cfg(test)]
mod memory {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::{ProgressError, ProgressStore};

    /// In-memory store whose value stays observable after the store is boxed.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MemoryProgressStore {
        value: Rc<Cell<usize>>,
        saves: Rc<Cell<u32>>,
    }

    impl MemoryProgressStore {
        pub(crate) fn with_value(value: usize) -> Self {
            let store = Self::default();
            store.value.set(value);
            store
        }

        pub(crate) fn value(&self) -> usize {
            self.value.get()
        }

        pub(crate) fn save_count(&self) -> u32 {
            self.saves.get()
        }
    }

    impl ProgressStore for MemoryProgressStore {
        fn load(&self) -> Result<usize, ProgressError> {
            Ok(self.value.get())
        }

        fn save(&mut self, last_stage_index: usize) -> Result<(), ProgressError> {
            self.value.set(last_stage_index);
            self.saves.set(self.saves.get() + 1);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_first_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonProgressStore::in_dir(dir.path());
        assert_eq!(store.load().expect("load"), 0);
    }

    #[test]
    fn saved_index_survives_a_new_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonProgressStore::in_dir(dir.path());
        store.save(4).expect("save");

        let reopened = JsonProgressStore::in_dir(dir.path());
        assert_eq!(reopened.load().expect("load"), 4);
        let raw = fs::read_to_string(reopened.path()).expect("read");
        assert!(raw.contains("\"last_stage_index\": 4"));
    }

    #[test]
    fn decode_errors_name_the_offending_field() {
        let error = parse_progress_json(r#"{"version": 1, "last_stage_index": "two"}"#)
            .expect_err("type mismatch");
        let message = error.to_string();
        assert!(message.contains("parse progress json at last_stage_index"));

        let error = parse_progress_json(r#"{"version": 1}"#).expect_err("missing field");
        assert!(error.to_string().contains("missing field"));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonProgressStore::in_dir(dir.path());
        fs::write(store.path(), r#"{"version": 9, "last_stage_index": 1}"#).expect("write");
        assert!(matches!(
            store.load(),
            Err(ProgressError::Version {
                expected: 1,
                actual: 9
            })
        ));
    }
}
