use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a run before or during the import.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("CSV file not found at {}", .0.display())]
    MissingCsv(PathBuf),

    #[error("CSV file {} has no header row", .0.display())]
    EmptyHeader(PathBuf),

    #[error("row {row} has {found} field(s) but the header declares {expected}")]
    FieldCount {
        row: u64,
        expected: usize,
        found: usize,
    },
}
