use jwalk::WalkDir;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::error::PipelineError;
use crate::utils::{create_progress_bar, ensure_directory, has_extension};

/// Every `.zip` file below `root`, skipping the `exclude` tree
pub fn find_archives(root: &Path, exclude: Option<&Path>) -> Vec<PathBuf> {
    let mut archives: Vec<PathBuf> = WalkDir::new(root)
        .skip_hidden(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| has_extension(path, "zip"))
        .filter(|path| exclude.map_or(true, |dir| !path.starts_with(dir)))
        .collect();
    archives.sort();
    archives
}

/// Extract every archive below `root` into `dest`.
///
/// Entries whose names would land outside `dest` are skipped. Returns the
/// number of files written.
pub fn extract_archives(
    root: &Path,
    dest: &Path,
    exclude: Option<&Path>,
    hide_progress: bool,
) -> Result<usize, PipelineError> {
    ensure_directory(dest)?;
    let archives = find_archives(root, exclude);
    if archives.is_empty() {
        info!("No archives found under {}", root.display());
        return Ok(0);
    }

    let mut written = 0;
    for archive_path in &archives {
        written += extract_archive(archive_path, dest, hide_progress)?;
    }
    info!("Extracted {} file(s) from {} archive(s)", written, archives.len());
    Ok(written)
}

fn extract_archive(path: &Path, dest: &Path, hide_progress: bool) -> Result<usize, PipelineError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pb = create_progress_bar(archive.len() as u64, &label, hide_progress);

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        pb.inc(1);
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe archive entry '{}' in {}", entry.name(), path.display());
            continue;
        };
        let target = dest.join(relative);
        if entry.is_dir() {
            ensure_directory(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            ensure_directory(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }
    pb.finish_and_clear();
    Ok(written)
}
