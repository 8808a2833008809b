//! Canonical error taxonomy
//!
//! Every failed operation produces exactly one [`CanonicalError`], whatever
//! the backend generation or wire shape that caused it.

use std::fmt;

/// Failure category of a canonical error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Client-side validation failed; no request was sent
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    ServerError,
    /// Transport-level failure (DNS, connection refused, reset)
    Network,
    /// A success or error body could not be decoded
    ParseFailure,
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status to its error kind
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::Validation,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::ServerError => "server_error",
            Self::Network => "network",
            Self::ParseFailure => "parse_failure",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error value returned to callers of the sync layer.
///
/// Built once per failed operation and never mutated afterwards. `status` is
/// the HTTP status when one was received, `0` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CanonicalError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
}

impl CanonicalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message, 0)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message, 0)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message, 0)
    }

    /// Fallback message used when an error body carries no usable message
    pub fn fallback_message(status: u16) -> String {
        format!("HTTP error! Status: {}", status)
    }
}

pub type ApiResult<T> = std::result::Result<T, CanonicalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Forbidden);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Unknown);
        assert_eq!(ErrorKind::from_status(302), ErrorKind::Unknown);
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = CanonicalError::new(ErrorKind::Conflict, "duplicate account", 409);
        assert_eq!(err.to_string(), "conflict: duplicate account");
    }

    #[test]
    fn test_fallback_message_embeds_status() {
        assert_eq!(CanonicalError::fallback_message(400), "HTTP error! Status: 400");
    }
}
