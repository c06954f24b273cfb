//! Assignment of shared sample identifiers across modalities.
//!
//! The i-th file of every modality's sorted `FileSet` receives the same
//! `SampleIndex`: either `i` itself, or `permutation[i]` when shuffling. The
//! permutation lives in a [`RunContext`] created once per run, so every
//! modality of the run sees the same one.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::layout::OutputLayout;
use crate::types::{ConversionJob, ErrorRecord, FileSet, Modality, SampleIndex};

/// State shared by every modality of a single run
#[derive(Debug, Clone)]
pub struct RunContext {
    permutation: Option<Vec<usize>>,
}

impl RunContext {
    /// Identifiers follow the sorted file order
    pub fn sequential() -> Self {
        RunContext { permutation: None }
    }

    /// Draw one permutation of `0..sample_count`, seeded when a seed is given
    pub fn shuffled(sample_count: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut permutation: Vec<usize> = (0..sample_count).collect();
        permutation.shuffle(&mut rng);
        RunContext {
            permutation: Some(permutation),
        }
    }

    /// Use a caller-provided permutation, which must be a bijection over `0..len`
    pub fn with_permutation(permutation: Vec<usize>) -> Result<Self, PipelineError> {
        let len = permutation.len();
        let mut seen = vec![false; len];
        for &value in &permutation {
            if value >= len || seen[value] {
                return Err(PipelineError::InvalidPermutation { len });
            }
            seen[value] = true;
        }
        Ok(RunContext {
            permutation: Some(permutation),
        })
    }

    pub fn is_shuffled(&self) -> bool {
        self.permutation.is_some()
    }

    /// Identifier of the file at `position` in its sorted `FileSet`
    pub fn sample_at(&self, position: usize) -> Option<SampleIndex> {
        match &self.permutation {
            Some(permutation) => permutation.get(position).copied().map(SampleIndex),
            None => Some(SampleIndex(position)),
        }
    }
}

/// One input file and the output path it was assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub sample: SampleIndex,
}

/// Inputs and outputs of one modality
#[derive(Debug, Clone, Default)]
pub struct ModalityFiles {
    pub inputs: FileSet,
    pub entries: Vec<IndexedFile>,
    /// Files that could not be given an identifier; reported with the batch
    pub rejected: Vec<ErrorRecord>,
}

impl ModalityFiles {
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter().map(|entry| &entry.output)
    }

    pub fn jobs(&self, modality: Modality) -> Vec<ConversionJob> {
        self.entries
            .iter()
            .map(|entry| ConversionJob {
                modality,
                input: entry.input.clone(),
                output: entry.output.clone(),
            })
            .collect()
    }
}

/// The complete file mapping of a run
#[derive(Debug, Clone, Default)]
pub struct FilesIndex {
    pub modalities: BTreeMap<Modality, ModalityFiles>,
    /// Annotation files; their count is the run's sample count
    pub canonical: FileSet,
    pub sample_count: usize,
}

impl FilesIndex {
    pub fn get(&self, modality: Modality) -> Option<&ModalityFiles> {
        self.modalities.get(&modality)
    }
}

/// Assign identifiers and output paths to one modality's files.
///
/// A path listed twice only keeps its first position; a position the run's
/// permutation does not cover cannot be resolved. Both cases are recorded as
/// rejected files and left out of the conversion jobs.
pub fn index_modality(
    modality: Modality,
    files: &FileSet,
    layout: &OutputLayout,
    context: &RunContext,
) -> ModalityFiles {
    let out_dir = layout.output_dir_for(modality);
    let suffix = modality.output_suffix();

    let mut seen = HashSet::with_capacity(files.len());
    let mut entries = Vec::with_capacity(files.len());
    let mut rejected = Vec::new();

    for (position, input) in files.iter().enumerate() {
        if !seen.insert(input) {
            warn!("Duplicate {} input {}", modality, input.display());
            rejected.push(ErrorRecord {
                modality,
                input: input.clone(),
                detail: format!("duplicate input path at position {}", position),
            });
            continue;
        }
        match context.sample_at(position) {
            Some(sample) => entries.push(IndexedFile {
                input: input.clone(),
                output: out_dir.join(sample.file_name(suffix)),
                sample,
            }),
            None => {
                warn!(
                    "No sample identifier for {} input {} at position {}",
                    modality,
                    input.display(),
                    position
                );
                rejected.push(ErrorRecord {
                    modality,
                    input: input.clone(),
                    detail: format!("position {} has no sample identifier", position),
                });
            }
        }
    }

    ModalityFiles {
        inputs: files.clone(),
        entries,
        rejected,
    }
}

/// Index every scanned modality with the run's shared context
pub fn build_files_index(
    file_sets: &BTreeMap<Modality, FileSet>,
    canonical: &FileSet,
    layout: &OutputLayout,
    context: &RunContext,
) -> FilesIndex {
    let sample_count = canonical.len();
    let modalities: BTreeMap<Modality, ModalityFiles> = file_sets
        .iter()
        .map(|(modality, files)| (*modality, index_modality(*modality, files, layout, context)))
        .collect();

    info!(
        "Indexed {} sample(s) across {} modalities{}",
        sample_count,
        modalities.len(),
        if context.is_shuffled() { " (shuffled)" } else { "" }
    );

    FilesIndex {
        modalities,
        canonical: canonical.clone(),
        sample_count,
    }
}
