use jwalk::WalkDir;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Remove directories below `input_dir` that hold no files.
///
/// Only strict descendants of `input_dir` are considered, judged on path
/// components. Deeper directories go first so a chain of empty folders
/// collapses in one pass. Returns the removed directories.
pub fn prune_empty_dirs(input_dir: &Path) -> Vec<PathBuf> {
    let Ok(input_dir) = input_dir.canonicalize() else {
        debug!("Input dir {} does not exist, nothing to prune", input_dir.display());
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = WalkDir::new(&input_dir)
        .skip_hidden(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path())
        .filter(|dir| is_strict_descendant(dir, &input_dir))
        .collect();
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

    let mut removed = Vec::new();
    for dir in dirs {
        match fs::remove_dir(&dir) {
            Ok(()) => removed.push(dir),
            Err(e) => debug!("Cannot remove {}: {}", dir.display(), e),
        }
    }

    if !removed.is_empty() {
        info!("Removed {} empty input folder(s)", removed.len());
    }
    removed
}

pub fn is_strict_descendant(path: &Path, ancestor: &Path) -> bool {
    path != ancestor && path.starts_with(ancestor)
}
