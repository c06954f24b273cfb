use jwalk::WalkDir;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::types::{FileSet, Modality};
use crate::utils::has_extension;

/// Recursively collect the input files of every requested modality.
///
/// Each distinct input extension is walked for once and shared by the
/// modalities reading it. A root nested inside an earlier root is only walked
/// once. Anything below `exclude` (the output tree) is ignored, as are entries
/// that cannot be read. A modality without matches gets an empty `FileSet`.
pub fn scan_inputs(
    roots: &[PathBuf],
    modalities: &[Modality],
    exclude: Option<&Path>,
) -> BTreeMap<Modality, FileSet> {
    let extensions: BTreeSet<&'static str> = modalities
        .iter()
        .map(|modality| modality.input_extension())
        .collect();

    let mut found: BTreeMap<&'static str, Vec<PathBuf>> =
        extensions.iter().map(|ext| (*ext, Vec::new())).collect();

    let exclude = exclude.map(|dir| dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));

    let mut walked: Vec<PathBuf> = Vec::new();
    for root in roots {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        if walked.iter().any(|done| root.starts_with(done)) {
            continue;
        }
        walked.retain(|done| !done.starts_with(&root));
        walked.push(root);
    }

    let entries = walked
        .iter()
        .flat_map(|root| WalkDir::new(root).skip_hidden(false).into_iter())
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| match &exclude {
            Some(dir) => !path.starts_with(dir),
            None => true,
        });

    for path in entries {
        if let Some(ext) = extensions.iter().find(|ext| has_extension(&path, ext)) {
            if let Some(files) = found.get_mut(ext) {
                files.push(path);
            }
        }
    }

    let file_sets: BTreeMap<Modality, FileSet> = modalities
        .iter()
        .map(|modality| {
            let files = found
                .get(modality.input_extension())
                .cloned()
                .unwrap_or_default();
            (*modality, FileSet::from_paths(files))
        })
        .collect();

    for (modality, files) in &file_sets {
        if files.is_empty() {
            debug!("No .{} files found for {}", modality.input_extension(), modality);
        } else {
            info!("Found {} {} input file(s)", files.len(), modality);
        }
    }

    file_sets
}
