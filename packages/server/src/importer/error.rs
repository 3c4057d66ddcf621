use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;

/// Why a challenge bundle could not be imported.
///
/// Every variant aborts the whole import; nothing is retried.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid zip archive: {0}")]
    Archive(String),
    #[error("No yaml file found in zip root!")]
    NoManifest,
    #[error("File '{0}' referenced by the manifest was not found in the bundle")]
    MissingFile(String),
    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_yaml::Error),
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{kind} with id {id} is not defined in the manifest")]
    UnknownReference { kind: &'static str, id: i64 },
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Structural and validation failures are the uploader's fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Archive(_)
                | Self::NoManifest
                | Self::MissingFile(_)
                | Self::Manifest(_)
                | Self::Validation { .. }
                | Self::UnknownReference { .. }
        )
    }
}
