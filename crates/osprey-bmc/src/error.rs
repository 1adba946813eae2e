//! Error types for BMC sessions and reconciliation

use reqwest::StatusCode;
use thiserror::Error;

/// Error type for BMC operations
#[derive(Debug, Error)]
pub enum BmcError {
    /// Bad credentials or a rejected login
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// 404 on a vendor endpoint, usually a firmware mismatch
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    /// The BMC refused a new session (its session table is full)
    #[error("session limit reached: {0}")]
    SessionLimitReached(String),

    /// Malformed desired-state input, caught before any mutation
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Every writable slot is occupied
    #[error("no free slot for {entity}")]
    NoFreeSlot { entity: String },

    /// Non-2xx response on a call that should have succeeded
    #[error("{context}: request failed with status {status}: {body}")]
    RequestFailed {
        context: String,
        status: StatusCode,
        body: String,
    },

    /// Response payload did not have the expected shape
    #[error("{context}: unexpected payload: {reason}")]
    UnmarshalFailed { context: String, reason: String },

    /// Job cannot be deleted in its current state
    #[error("job {job_id} not purgeable (type {job_type}, state {job_state})")]
    JobNotPurgeable {
        job_id: String,
        job_type: String,
        job_state: String,
    },

    /// A vendor CLI command ran but did not report success
    #[error("command failed: {command}: {output}")]
    CommandFailed { command: String, output: String },

    /// HTTP transport failure
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// SSH transport failure
    #[error("ssh transport error: {0}")]
    Ssh(String),
}

impl From<russh::Error> for BmcError {
    fn from(err: russh::Error) -> Self {
        BmcError::Ssh(err.to_string())
    }
}

/// Result type for BMC operations
pub type Result<T> = std::result::Result<T, BmcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BmcError::AuthFailed("bad credentials for root".to_string());
        assert_eq!(err.to_string(), "authentication failed: bad credentials for root");

        let err = BmcError::NoFreeSlot {
            entity: "alice".to_string(),
        };
        assert_eq!(err.to_string(), "no free slot for alice");

        let err = BmcError::JobNotPurgeable {
            job_id: "JID_1234".to_string(),
            job_type: "BIOSConfiguration".to_string(),
            job_state: "Running".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "job JID_1234 not purgeable (type BIOSConfiguration, state Running)"
        );
    }

    #[test]
    fn test_request_failed_carries_context() {
        let err = BmcError::RequestFailed {
            context: "PUT iDRAC.Users.4".to_string(),
            status: StatusCode::BAD_REQUEST,
            body: "invalid attribute".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("iDRAC.Users.4"));
        assert!(rendered.contains("400"));
        assert!(rendered.contains("invalid attribute"));
    }
}
