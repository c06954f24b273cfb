//! Sensor-label dataset to KITTI converter
//!
//! This library discovers images, point clouds and JSON annotations, gives
//! every sample one zero-padded identifier shared by all its files, converts
//! each modality on a bounded worker pool and writes the KITTI `ImageSets`
//! split files.

pub mod archive;
pub mod cleanup;
pub mod config;
pub mod converters;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod indexer;
pub mod layout;
pub mod pipeline;
pub mod repair;
pub mod scanner;
pub mod splits;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types and functions
pub use config::Args;
pub use converters::ConverterSet;
pub use dispatcher::{run_batch, Converter};
pub use error::{ConvertError, PipelineError};
pub use gate::{LogNotifier, Notifier, RunGate};
pub use indexer::{build_files_index, FilesIndex, RunContext};
pub use layout::OutputLayout;
pub use pipeline::{run, run_with};
pub use repair::repair_first_sample;
pub use scanner::scan_inputs;
pub use splits::write_image_sets;
pub use types::{ConversionJob, ErrorLog, FileSet, Modality, RunReport, SampleIndex};
pub use validation::{CrossModalValidator, Validator};
