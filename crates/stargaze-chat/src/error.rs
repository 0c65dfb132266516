//! Error types for the query pipeline.

use stargaze_archive::ArchiveError;
use stargaze_core::QueryKind;

/// Errors from classification, generation, validation and dispatch.
///
/// Every variant except the two input checks is fatal to the request that
/// raised it; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyMessage,
    #[error("query exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion service returned {status}: {body}")]
    CompletionStatus { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    MalformedCompletion(String),
    #[error("unexpected classification: {0:?}")]
    Classification(String),
    #[error("invalid {kind} generated: {query}")]
    InvalidQuery { kind: QueryKind, query: String },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// True for errors caused by the caller's input rather than the pipeline.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ChatError::EmptyMessage | ChatError::MessageTooLong(_))
    }
}
