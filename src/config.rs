use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PipelineError;
use crate::types::Modality;

/// Command-line arguments for converting a sensor-label dataset to the KITTI layout.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Convert sensor-label datasets to KITTI", long_about = None)]
pub struct Args {
    /// Root directory scanned recursively for input files
    #[arg(long = "root_path", default_value = "data")]
    pub root_path: String,

    /// Number of conversion workers per modality batch
    #[arg(long = "num_threads", default_value_t = 3, value_parser = validate_workers)]
    pub num_threads: usize,

    /// Directory archives are extracted into (defaults to <root_path>/input)
    #[arg(long = "input_dir")]
    pub input_dir: Option<String>,

    /// Directory the KITTI tree is created in (defaults to <root_path>/output)
    #[arg(long = "output_dir")]
    pub output_dir: Option<String>,

    /// Name of the top-level folder of the KITTI tree
    #[arg(long = "top_folder", default_value = "kitti")]
    pub top_folder: String,

    /// Assign sample identifiers from a random permutation instead of file order
    #[arg(long = "shuffle")]
    pub shuffle: bool,

    /// Seed for the shuffle permutation
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Share of the samples used for training, the rest goes to validation
    #[arg(long = "train_val_ratio", default_value_t = 0.7, value_parser = validate_ratio)]
    pub train_val_ratio: f64,

    /// Modalities to convert: image, point_cloud, label, calib (default: all)
    #[arg(long = "modalities", use_value_delimiter = true)]
    pub modalities: Vec<String>,

    /// Extract every zip archive under the root into the input directory first
    #[arg(long = "extract_archives")]
    pub extract_archives: bool,

    /// Remove input folders left empty after the run
    #[arg(long = "prune_empty_dirs")]
    pub prune_empty_dirs: bool,

    /// Hide progress bars
    #[arg(long = "no_progress")]
    pub no_progress: bool,
}

impl Args {
    pub fn root_dir(&self) -> PathBuf {
        PathBuf::from(&self.root_path)
    }

    pub fn input_dir(&self) -> PathBuf {
        self.input_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.root_dir().join("input"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.root_dir().join("output"))
    }

    /// Resolve the requested modalities in conversion order.
    ///
    /// An empty list selects every modality; any name outside the known set is
    /// a fatal configuration error.
    pub fn selected_modalities(&self) -> Result<Vec<Modality>, PipelineError> {
        if self.modalities.is_empty() {
            return Ok(Modality::ALL.to_vec());
        }
        let mut selected = self
            .modalities
            .iter()
            .map(|name| Modality::from_str(name))
            .collect::<Result<Vec<_>, _>>()?;
        selected.sort();
        selected.dedup();
        Ok(selected)
    }

    /// Re-check values that bypass clap when `Args` is built in code
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.num_threads == 0 {
            return Err(PipelineError::Configuration(
                "num_threads must be at least 1".to_string(),
            ));
        }
        if !(self.train_val_ratio > 0.0 && self.train_val_ratio < 1.0) {
            return Err(PipelineError::Configuration(format!(
                "train_val_ratio must be between 0.0 and 1.0, got {}",
                self.train_val_ratio
            )));
        }
        self.selected_modalities().map(|_| ())
    }
}

// Validate that the ratio lies strictly between 0.0 and 1.0
pub fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val > 0.0 && val < 1.0 => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0 (exclusive)".to_string()),
    }
}

pub fn validate_workers(s: &str) -> Result<usize, String> {
    match usize::from_str(s) {
        Ok(val) if val >= 1 => Ok(val),
        _ => Err("NUM_THREADS must be a positive integer".to_string()),
    }
}
