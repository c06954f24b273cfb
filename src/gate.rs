use log::{error, info};

use crate::error::PipelineError;
use crate::types::{ErrorLog, Modality};

/// Receives the summary of the first failed batch of a run
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, modality: Modality, errors: &ErrorLog);
}

/// Writes the failure summary to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, modality: Modality, errors: &ErrorLog) {
        error!(
            "Conversion error in {} ({} file(s)):\n{}",
            modality,
            errors.len(),
            errors.summary()
        );
    }
}

/// Decides after each batch whether the run may continue
pub struct RunGate<'a> {
    notifier: &'a dyn Notifier,
}

impl<'a> RunGate<'a> {
    pub fn new(notifier: &'a dyn Notifier) -> Self {
        RunGate { notifier }
    }

    /// Pass when the batch logged no failure; otherwise notify and abort
    pub fn check(&self, modality: Modality, errors: &ErrorLog) -> Result<(), PipelineError> {
        if errors.is_empty() {
            info!("{} conversion passed", modality);
            return Ok(());
        }
        self.notifier.notify_failure(modality, errors);
        Err(PipelineError::BatchFailed {
            modality,
            failures: errors.len(),
        })
    }
}
