use log::{error, info};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::PipelineError;
use crate::indexer::FilesIndex;
use crate::types::{Modality, SampleIndex, SplitSummary};

pub const TRAINVAL_FILE: &str = "trainval.txt";
pub const TRAIN_FILE: &str = "train.txt";
pub const VAL_FILE: &str = "val.txt";
pub const TEST_FILE: &str = "test.txt";

/// Samples whose converted label file holds no object.
///
/// Missing label files are not counted; only files that exist and are empty.
pub fn find_empty_samples(index: &FilesIndex) -> BTreeSet<SampleIndex> {
    let Some(labels) = index.get(Modality::Label) else {
        return BTreeSet::new();
    };
    labels
        .entries
        .iter()
        .filter(|entry| {
            fs::metadata(&entry.output)
                .map(|meta| meta.is_file() && meta.len() == 0)
                .unwrap_or(false)
        })
        .map(|entry| entry.sample)
        .collect()
}

/// Write `trainval.txt`, `train.txt`, `val.txt` and an empty `test.txt`.
///
/// Candidates are `0..sample_count` minus the empty samples, ascending. The
/// train/val cut is `round(ratio * sample_count)`, taken against the total
/// count rather than the number of candidates.
pub fn write_image_sets(
    image_sets_dir: &Path,
    sample_count: usize,
    empty: &BTreeSet<SampleIndex>,
    ratio: f64,
) -> Result<SplitSummary, PipelineError> {
    let trainval: Vec<SampleIndex> = (0..sample_count)
        .map(SampleIndex)
        .filter(|sample| !empty.contains(sample))
        .collect();

    if trainval.len() != sample_count.saturating_sub(empty.len()) {
        error!(
            "Invalid image sets: {} candidate(s) for {} sample(s) with {} empty",
            trainval.len(),
            sample_count,
            empty.len()
        );
    }

    let cut = ((ratio * sample_count as f64).round() as usize).min(trainval.len());
    let (train, val) = trainval.split_at(cut);

    write_index_file(&image_sets_dir.join(TRAINVAL_FILE), &trainval)?;
    write_index_file(&image_sets_dir.join(TRAIN_FILE), train)?;
    write_index_file(&image_sets_dir.join(VAL_FILE), val)?;
    write_index_file(&image_sets_dir.join(TEST_FILE), &[])?;

    info!(
        "Image sets written: {} trainval, {} train, {} val",
        trainval.len(),
        train.len(),
        val.len()
    );

    Ok(SplitSummary {
        trainval: trainval.len(),
        train: train.len(),
        val: val.len(),
    })
}

fn write_index_file(path: &Path, samples: &[SampleIndex]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for sample in samples {
        writeln!(writer, "{}", sample)?;
    }
    writer.flush()
}
