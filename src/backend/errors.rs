use thiserror::Error;

/// Failures talking to the status backend. Transport problems and
/// unexpected statuses both surface as retryable conditions to the user;
/// a missing incident on the update path is its own case because it ends
/// the flow before a draft exists.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("status backend did not respond: {source}")]
    Unreachable {
        #[source]
        source: reqwest::Error,
    },

    #[error("status backend answered {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("incident {id} was not found on the status backend")]
    IncidentNotFound { id: u64 },

    #[error("backend response could not be decoded: {reason}")]
    MalformedResponse { reason: String },

    #[error("no API key is configured for the status backend")]
    MissingApiKey,
}

impl BackendError {
    /// Whether retrying the same call later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Unreachable { .. } | BackendError::UnexpectedStatus { .. }
        )
    }
}
