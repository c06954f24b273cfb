use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Modality;

/// Failure of a single conversion routine on a single file.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image conversion failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid content in {path}: {message}")]
    InvalidContent { path: PathBuf, message: String },
    #[error("conversion routine panicked: {0}")]
    Panicked(String),
}

impl ConvertError {
    pub fn invalid_content(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ConvertError::InvalidContent {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Run-level failures. Any of these stops the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("archive extraction failed: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("unknown extension '{0}'")]
    UnknownExtension(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("permutation of {len} entries is not a bijection over 0..{len}")]
    InvalidPermutation { len: usize },
    #[error("{modality} has {found} input files, expected {expected}")]
    CountMismatch {
        modality: Modality,
        expected: usize,
        found: usize,
    },
    #[error("{modality} input {path} does not match annotation '{expected}' at position {position}")]
    NameMismatch {
        modality: Modality,
        position: usize,
        path: PathBuf,
        expected: String,
    },
    #[error("cannot fill sample slot 0 for {modality}: {reason}")]
    Repair { modality: Modality, reason: String },
    #[error("{modality} conversion failed for {failures} file(s)")]
    BatchFailed { modality: Modality, failures: usize },
}
