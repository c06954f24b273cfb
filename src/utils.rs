use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        // indicatif 0.17 rejects malformed templates; a plain bar is enough then
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Build a dedicated worker pool with exactly `workers` threads
pub fn create_worker_pool(workers: usize) -> Result<rayon::ThreadPool, PipelineError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("convert-{}", i))
        .build()?;
    Ok(pool)
}

/// Create a directory (and its parents) unless it already exists.
///
/// Existing content is left untouched.
pub fn ensure_directory(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_dir() {
        debug!("Directory {} already exists", path.display());
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// Whether `path` carries the given extension, ignoring ASCII case
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
