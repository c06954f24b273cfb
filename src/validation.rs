use log::info;

use crate::error::PipelineError;
use crate::indexer::FilesIndex;

/// Checks a complete file mapping before any conversion starts
pub trait Validator {
    fn validate(&self, index: &FilesIndex) -> Result<(), PipelineError>;
}

/// Every modality that has files must have one per annotation, and the
/// file stems must line up position by position with the annotations.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossModalValidator;

impl Validator for CrossModalValidator {
    fn validate(&self, index: &FilesIndex) -> Result<(), PipelineError> {
        let expected: Vec<String> = index.canonical.iter().map(|path| stem_of(path)).collect();

        for (modality, files) in &index.modalities {
            if files.inputs.is_empty() {
                continue;
            }
            if files.inputs.len() != index.sample_count {
                return Err(PipelineError::CountMismatch {
                    modality: *modality,
                    expected: index.sample_count,
                    found: files.inputs.len(),
                });
            }
            for (position, path) in files.inputs.iter().enumerate() {
                if stem_of(path) != expected[position] {
                    return Err(PipelineError::NameMismatch {
                        modality: *modality,
                        position,
                        path: path.clone(),
                        expected: expected[position].clone(),
                    });
                }
            }
        }

        info!("Validated {} sample(s)", index.sample_count);
        Ok(())
    }
}

fn stem_of(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
