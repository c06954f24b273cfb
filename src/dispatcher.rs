use indicatif::ProgressBar;
use log::{error, info};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::error::{ConvertError, PipelineError};
use crate::types::{ConversionJob, ErrorLog, Modality};
use crate::utils::create_worker_pool;

/// A format-specific conversion routine.
///
/// Reads `input`, writes `output`, and reports failure through the result.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

impl<F> Converter for F
where
    F: Fn(&Path, &Path) -> Result<(), ConvertError> + Send + Sync,
{
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        self(input, output)
    }
}

/// Run every job of one modality on a pool of `workers` threads.
///
/// Blocks until the whole batch has finished. A failing or panicking job is
/// recorded in the returned log and never stops its siblings.
pub fn run_batch(
    modality: Modality,
    converter: &dyn Converter,
    jobs: &[ConversionJob],
    workers: usize,
    pb: &ProgressBar,
) -> Result<ErrorLog, PipelineError> {
    let errors = ErrorLog::new();
    let pool = create_worker_pool(workers)?;

    pool.install(|| {
        jobs.par_iter().for_each(|job| {
            if let Err(e) = convert_isolated(converter, job) {
                error!(
                    "Failed to convert {} {}: {}",
                    modality,
                    job.input.display(),
                    e
                );
                errors.record(modality, &job.input, e.to_string());
            }
            pb.inc(1);
        });
    });

    info!(
        "{} batch finished: {} ok, {} failed",
        modality,
        jobs.len().saturating_sub(errors.len()),
        errors.len()
    );
    Ok(errors)
}

fn convert_isolated(converter: &dyn Converter, job: &ConversionJob) -> Result<(), ConvertError> {
    match panic::catch_unwind(AssertUnwindSafe(|| {
        converter.convert(&job.input, &job.output)
    })) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ConvertError::Panicked(message))
        }
    }
}
