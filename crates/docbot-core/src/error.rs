//! Error types for the client workflows.
//!
//! Every failure a workflow can hit ends up as one of these enums and is turned
//! into status text at the workflow boundary. None of them are meant to reach
//! the shell as a crash.

use thiserror::Error;

/// Failure while establishing a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The authenticator answered, but with a grant that cannot become a session
    /// (empty token and similar).
    #[error("authentication rejected: {0}")]
    Rejected(String),

    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

/// Failure talking to the document/chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("could not decode server response: {0}")]
    Decode(String),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Failure of a document operation, either local validation or a server call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("not signed in")]
    NoSession,

    #[error("no file selected")]
    NoFileSelected,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("upload of {0} is already in progress")]
    UploadInFlight(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("{name} is {size} bytes, the limit is {limit} bytes")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("could not read file: {0}")]
    Io(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_only_matches_404() {
        let missing = ApiError::Status { status: 404, detail: "File not found".into() };
        let broken = ApiError::Status { status: 500, detail: "boom".into() };
        assert!(missing.is_not_found());
        assert!(!broken.is_not_found());
        assert!(!ApiError::Timeout.is_not_found());
    }

    #[test]
    fn test_api_error_wraps_transparently() {
        let err: DocumentError = ApiError::Timeout.into();
        assert_eq!(err.to_string(), "request timed out");
    }
}
