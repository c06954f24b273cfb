//! Creation of the fixed KITTI output tree.

use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::types::Modality;
use crate::utils::ensure_directory;

pub const IMAGE_SETS: &str = "ImageSets";
pub const TESTING: &str = "testing";
pub const TRAINING: &str = "training";

const TESTING_SUBDIRS: &[&str] = &["calib", "image", "point_cloud"];
const TRAINING_SUBDIRS: &[&str] = &["calib", "image", "point_cloud", "label"];

/// Handles to every folder of the output tree, keyed by logical slot name
/// (`image_sets`, `testing`, `training`, `testing_image`, `training_label`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    top_dir: PathBuf,
    folders: BTreeMap<String, PathBuf>,
}

impl OutputLayout {
    /// Create every folder of the tree below `output_dir/top_folder`.
    ///
    /// Folders that already exist are reused, so building twice yields the
    /// same handles and leaves existing files alone.
    pub fn build(output_dir: &Path, top_folder: &str) -> Result<Self, PipelineError> {
        ensure_directory(output_dir)?;
        let top_dir = ensure_directory(&fs::canonicalize(output_dir)?.join(top_folder))?;

        let mut folders = BTreeMap::new();
        folders.insert(
            "image_sets".to_string(),
            ensure_directory(&top_dir.join(IMAGE_SETS))?,
        );

        for (split, subdirs) in [(TESTING, TESTING_SUBDIRS), (TRAINING, TRAINING_SUBDIRS)] {
            let split_dir = ensure_directory(&top_dir.join(split))?;
            for subdir in subdirs {
                let dir = ensure_directory(&split_dir.join(subdir))?;
                folders.insert(format!("{}_{}", split, subdir), dir);
            }
            folders.insert(split.to_string(), split_dir);
        }

        info!("Output layout ready at {}", top_dir.display());
        Ok(OutputLayout { top_dir, folders })
    }

    pub fn top_dir(&self) -> &Path {
        &self.top_dir
    }

    pub fn folders(&self) -> &BTreeMap<String, PathBuf> {
        &self.folders
    }

    pub fn folder(&self, slot: &str) -> Option<&Path> {
        self.folders.get(slot).map(PathBuf::as_path)
    }

    pub fn image_sets_dir(&self) -> &Path {
        &self.folders["image_sets"]
    }

    /// Training folder a modality writes its converted files into
    pub fn output_dir_for(&self, modality: Modality) -> &Path {
        &self.folders[modality.output_slot()]
    }
}

/// Make sure the input and output base directories exist
pub fn ensure_base_dirs(input_dir: &Path, output_dir: &Path) -> Result<(), PipelineError> {
    ensure_directory(input_dir)?;
    ensure_directory(output_dir)?;
    Ok(())
}
