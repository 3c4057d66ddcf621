use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path}: row {row} has {found} column(s), expected at least 2")]
    MissingColumn {
        path: PathBuf,
        row: usize,
        found: usize,
    },
    #[error("{path}: duplicate prediction for ID '{id}'")]
    DuplicateId { path: PathBuf, id: String },
    #[error("ground truth file {0} contains no rows")]
    EmptyGroundTruth(PathBuf),
    #[error("phase '{0}' is not scored by this evaluation script")]
    UnknownPhase(String),
}
