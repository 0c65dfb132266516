//! Error types for archive access.

use stargaze_core::QueryKind;

/// Errors from the remote archives.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} error {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} response is not valid JSON: {message}")]
    InvalidJson {
        service: &'static str,
        message: String,
    },
    #[error("{service} only accepts {expected} queries, got {got}")]
    WrongDialect {
        service: &'static str,
        expected: QueryKind,
        got: QueryKind,
    },
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}
