use std::path::PathBuf;

use thiserror::Error;

use crate::classification::domain::labeled_sample::{LabeledSample, RecordError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: RecordError,
    },
    #[error("{path}:{line}: blank identity name")]
    BlankName { path: PathBuf, line: usize },
}

/// Durable, append-only home of the training corpus and identity names.
///
/// Appends are line-atomic: a failure partway through a batch leaves every
/// previously written record intact.
pub trait TrainingStore: Send {
    fn load_samples(&self) -> Result<Vec<LabeledSample>, StoreError>;
    fn append_samples(&mut self, samples: &[LabeledSample]) -> Result<(), StoreError>;
    fn load_names(&self) -> Result<Vec<String>, StoreError>;
    fn append_name(&mut self, name: &str) -> Result<(), StoreError>;
}
