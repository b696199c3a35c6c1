use thiserror::Error;

/// Failure taxonomy for the tracker. None of these ever escape into the
/// host application; they are caught at the facade and at most logged.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("storage backend '{backend}' unavailable: {reason}")]
    StorageUnavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("stored value failed to parse")]
    MalformedRecord,

    #[error("beacon delivery failed: {0}")]
    NetworkFailure(String),

    #[error("invalid tracker configuration: {0}")]
    ConfigurationError(String),
}

impl TrackerError {
    pub fn unavailable(backend: &'static str, reason: impl ToString) -> Self {
        TrackerError::StorageUnavailable {
            backend,
            reason: reason.to_string(),
        }
    }
}
