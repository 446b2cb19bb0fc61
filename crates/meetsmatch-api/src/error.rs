//! Error taxonomy for matching operations and its mapping onto gRPC codes.

use tonic::Status;
use tracing::warn;

use crate::storage::DatabaseError;

pub type MatchResult<T> = Result<T, MatchError>;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// Missing or malformed identifiers. Never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The actor is not a participant of the match.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Token bucket empty, or the limiter itself failed.
    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// Storage or cache failure. The message is for logs only.
    #[error("{operation} failed: {message}")]
    Internal {
        operation: &'static str,
        message: String,
    },
}

impl MatchError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// `map_err` adapter that wraps a storage error with the operation name.
    ///
    /// `NotFound` and `InvalidInput` from storage keep their meaning.
    pub fn internal(operation: &'static str) -> impl Fn(DatabaseError) -> Self {
        move |e| match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            DatabaseError::InvalidInput(msg) => Self::InvalidArgument(msg),
            other => Self::Internal {
                operation,
                message: other.to_string(),
            },
        }
    }
}

impl From<MatchError> for Status {
    fn from(e: MatchError) -> Self {
        match e {
            MatchError::InvalidArgument(msg) => Self::invalid_argument(msg),
            MatchError::NotFound(what) => Self::not_found(format!("{what} not found")),
            MatchError::PermissionDenied(msg) => Self::permission_denied(msg),
            MatchError::RateLimited(_) => Self::resource_exhausted("Rate limit exceeded"),
            MatchError::Timeout { operation } => {
                warn!(operation, "Operation timed out");
                Self::unavailable("Operation timed out, please retry")
            }
            MatchError::Internal { operation, message } => {
                warn!(operation, error = %message, "Internal error");
                Self::internal("Internal error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let status: Status = MatchError::internal("LikeMatch")(DatabaseError::Query(
            "UNIQUE constraint failed: matches.secret_column".into(),
        ))
        .into();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "Internal error");
    }

    #[test]
    fn storage_errors_keep_their_meaning() {
        let err = MatchError::internal("GetMatch")(DatabaseError::NotFound("Match m1".into()));
        assert!(matches!(err, MatchError::NotFound(_)));
        assert_eq!(Status::from(err).code(), Code::NotFound);

        let err = MatchError::internal("CreateMatch")(DatabaseError::InvalidInput("bad".into()));
        assert!(matches!(err, MatchError::InvalidArgument(_)));
    }

    #[test]
    fn code_mapping() {
        let cases = [
            (MatchError::invalid("userId is required"), Code::InvalidArgument),
            (MatchError::PermissionDenied("x".into()), Code::PermissionDenied),
            (MatchError::RateLimited("u1".into()), Code::ResourceExhausted),
            (MatchError::Timeout { operation: "GetMatch" }, Code::Unavailable),
        ];
        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }
}
