//! Filling sample slot 0 when the first sample is missing.
//!
//! Index files and downstream tooling expect `000000` to exist. When it does
//! not, the earliest non-empty sample of every modality is renamed into slot 0
//! so all modalities stay aligned.

use log::info;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::indexer::FilesIndex;
use crate::types::SampleIndex;

/// What the repair did to one modality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Rename the earliest non-empty output of every modality into slot 0.
///
/// Nothing happens when there are no empty markers, or when the smallest
/// marker is already slot 0. Otherwise each modality picks, among its output
/// files present on disk whose identifier is not marked empty, the one with
/// the smallest path. If that is not already slot 0 it is renamed in place and
/// the mapping is updated. A modality with outputs but no candidate is an error.
pub fn repair_first_sample(
    empty: &BTreeSet<SampleIndex>,
    index: &mut FilesIndex,
) -> Result<Vec<Renamed>, PipelineError> {
    let Some(first_empty) = empty.first() else {
        info!("No empty samples, slot {} left as is", SampleIndex::ZERO);
        return Ok(Vec::new());
    };
    if *first_empty == SampleIndex::ZERO {
        info!("Sample {} is marked empty, slot left as is", SampleIndex::ZERO);
        return Ok(Vec::new());
    }

    let mut renamed = Vec::new();
    for (modality, files) in index.modalities.iter_mut() {
        if files.entries.is_empty() {
            continue;
        }

        let candidate = files
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                SampleIndex::from_path(&entry.output).map_or(true, |sample| !empty.contains(&sample))
            })
            .filter(|(_, entry)| entry.output.is_file())
            .min_by(|(_, a), (_, b)| a.output.cmp(&b.output))
            .map(|(position, _)| position);

        let Some(position) = candidate else {
            return Err(PipelineError::Repair {
                modality: *modality,
                reason: "no non-empty output file exists".to_string(),
            });
        };

        let from = files.entries[position].output.clone();
        if SampleIndex::from_path(&from) == Some(SampleIndex::ZERO) {
            continue;
        }

        let suffix = from
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| modality.output_suffix().to_string());
        let to = from.with_file_name(SampleIndex::ZERO.file_name(&suffix));
        fs::rename(&from, &to)?;
        info!("{} renamed to {}", from.display(), to.display());

        // Keep the mapping a bijection: the entry that pointed at slot 0
        // takes over the name that was just vacated.
        let vacated = files.entries[position].sample;
        if let Some(zero) = files.entries.iter().position(|entry| entry.output == to) {
            files.entries[zero].output = from.clone();
            files.entries[zero].sample = vacated;
        }
        files.entries[position].output = to.clone();
        files.entries[position].sample = SampleIndex::ZERO;

        renamed.push(Renamed { from, to });
    }

    Ok(renamed)
}
