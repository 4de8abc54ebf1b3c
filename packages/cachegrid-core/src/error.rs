//! The three-way error taxonomy shared by the store, adapters, and surface.

use thiserror::Error;

/// A cache operation error, carrying enough structure for the HTTP surface
/// to map it to a status code without inspecting the message text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Malformed input at the boundary (missing field, wrong shape).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The targeted key is absent or has expired.
    #[error("not found")]
    NotFound,

    /// Any internal failure: I/O, parse, or a missing backing adapter.
    #[error("server error: {0}")]
    Server(String),
}

impl CacheError {
    /// Short machine-readable kind, used in structured logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound => "not_found",
            Self::Server(_) => "server",
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(CacheError::BadRequest("x".into()).kind(), "bad_request");
        assert_eq!(CacheError::NotFound.kind(), "not_found");
        assert_eq!(CacheError::Server("x".into()).kind(), "server");
    }

    #[test]
    fn display_includes_message() {
        let err = CacheError::BadRequest("missing key".into());
        assert_eq!(err.to_string(), "bad request: missing key");
    }
}
