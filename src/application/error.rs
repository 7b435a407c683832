use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Schema operation failed: {0}")]
    SchemaOperationFailed(String),

    #[error("Unexpected intermediate state: {0}")]
    UnexpectedIntermediateState(String),

    #[error("Row transformation failed: {0}")]
    RowTransformationFailed(String),

    #[error("Unknown version: {0}")]
    UnknownVersion(String),

    #[error("Invalid version range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Step {index} ({step}) failed: {source}")]
    StepFailed {
        index: usize,
        step: String,
        #[source]
        source: Box<MigrationError>,
    },
}

/// Coarse classification of a [`MigrationError`], looking through
/// [`MigrationError::StepFailed`] to the error that actually stopped the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SchemaOperationFailed,
    UnexpectedIntermediateState,
    RowTransformationFailed,
    UnknownVersion,
    InvalidRange,
    Config,
}

impl MigrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::SchemaOperationFailed(_) => ErrorKind::SchemaOperationFailed,
            MigrationError::UnexpectedIntermediateState(_) => {
                ErrorKind::UnexpectedIntermediateState
            }
            MigrationError::RowTransformationFailed(_) => ErrorKind::RowTransformationFailed,
            MigrationError::UnknownVersion(_) => ErrorKind::UnknownVersion,
            MigrationError::InvalidRange(_) => ErrorKind::InvalidRange,
            MigrationError::Config(_) => ErrorKind::Config,
            MigrationError::StepFailed { source, .. } => source.kind(),
        }
    }

    /// Name of the step that failed, if the error came out of the runner
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            MigrationError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

impl From<DbErr> for MigrationError {
    fn from(err: DbErr) -> Self {
        MigrationError::SchemaOperationFailed(err.to_string())
    }
}

impl From<sea_orm::sea_query::error::Error> for MigrationError {
    fn from(err: sea_orm::sea_query::error::Error) -> Self {
        MigrationError::SchemaOperationFailed(format!("Failed to build statement: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
