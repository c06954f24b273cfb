use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::PipelineError;

/// Number of digits in every sample identifier written to disk
pub const SAMPLE_ID_WIDTH: usize = 6;

/// Input extension of the annotation files that define the sample count
pub const CANONICAL_EXTENSION: &str = "json";

/// The closed set of data kinds that take part in a sample.
///
/// Every variant maps statically to an input extension, an output slot in the
/// training tree and an output suffix. `Calib` has no files of its own: it is
/// transcribed from the same annotation JSON as `Label`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modality {
    Image,
    PointCloud,
    Label,
    Calib,
}

impl Modality {
    /// Conversion order of a full run
    pub const ALL: [Modality; 4] = [
        Modality::Image,
        Modality::PointCloud,
        Modality::Label,
        Modality::Calib,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::PointCloud => "point_cloud",
            Modality::Label => "label",
            Modality::Calib => "calib",
        }
    }

    /// Extension of the input files this modality is converted from
    pub fn input_extension(self) -> &'static str {
        match self {
            Modality::Image => "jpg",
            Modality::PointCloud => "pcd",
            Modality::Label | Modality::Calib => CANONICAL_EXTENSION,
        }
    }

    /// Suffix of the files written into the output layout
    pub fn output_suffix(self) -> &'static str {
        match self {
            Modality::Image => "png",
            Modality::PointCloud => "bin",
            Modality::Label | Modality::Calib => "txt",
        }
    }

    /// Logical slot of the output layout this modality writes into
    pub fn output_slot(self) -> &'static str {
        match self {
            Modality::Image => "training_image",
            Modality::PointCloud => "training_point_cloud",
            Modality::Label => "training_label",
            Modality::Calib => "training_calib",
        }
    }

    pub fn is_canonical(self) -> bool {
        self == Modality::Label
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modality {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "jpg" => Ok(Modality::Image),
            "point_cloud" | "pcd" => Ok(Modality::PointCloud),
            "label" | "json" => Ok(Modality::Label),
            "calib" => Ok(Modality::Calib),
            other => Err(PipelineError::UnknownExtension(other.to_string())),
        }
    }
}

/// Shared numeric identifier of one sample across all modalities
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleIndex(pub usize);

impl SampleIndex {
    pub const ZERO: SampleIndex = SampleIndex(0);

    /// Parse the identifier out of a file name such as `000042.png`
    pub fn from_path(path: &Path) -> Option<SampleIndex> {
        path.file_stem()?.to_str()?.parse().ok()
    }

    /// File name of this sample for the given output suffix
    pub fn file_name(self, suffix: &str) -> String {
        format!("{}.{}", self, suffix)
    }
}

impl fmt::Display for SampleIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = SAMPLE_ID_WIDTH)
    }
}

impl FromStr for SampleIndex {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<usize>().map(SampleIndex)
    }
}

/// Discovered input files of one extension, sorted by their path string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet(Vec<PathBuf>);

impl FileSet {
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        paths.sort_by_cached_key(|path| path.to_string_lossy().into_owned());
        FileSet(paths)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.0.iter()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }
}

/// One unit of work handed to the worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub modality: Modality,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// A single failed file, recorded instead of being propagated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub modality: Modality,
    pub input: PathBuf,
    pub detail: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.modality, self.input.display(), self.detail)
    }
}

/// Failures of one modality batch.
///
/// Append-only: workers add concurrently, grouped by input path, and a second
/// failure for the same path is kept next to the first.
#[derive(Debug, Default)]
pub struct ErrorLog {
    records: DashMap<PathBuf, Vec<ErrorRecord>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, modality: Modality, input: &Path, detail: impl Into<String>) {
        self.push(ErrorRecord {
            modality,
            input: input.to_path_buf(),
            detail: detail.into(),
        });
    }

    pub fn extend(&self, records: impl IntoIterator<Item = ErrorRecord>) {
        for record in records {
            self.push(record);
        }
    }

    fn push(&self, record: ErrorRecord) {
        self.records
            .entry(record.input.clone())
            .or_default()
            .push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of recorded failures
    pub fn len(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    /// Snapshot of all records ordered by input path
    pub fn records(&self) -> Vec<ErrorRecord> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.input.cmp(&b.input));
        records
    }

    /// Human readable summary, one failed file per line
    pub fn summary(&self) -> String {
        self.records()
            .iter()
            .map(|record| record.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sizes of the generated split index files
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub trainval: usize,
    pub train: usize,
    pub val: usize,
}

/// Outcome of a run that passed every gate
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub sample_count: usize,
    pub converted: BTreeMap<Modality, usize>,
    pub empty_samples: usize,
    pub splits: SplitSummary,
}
