//! Conversational query routing for Stargaze.
//!
//! Classifies astronomy questions, translates them into shape-checked
//! SQL/ADQL, keeps per-user conversation history, and dispatches each
//! request to the archive that can answer it.

pub mod completion;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod translator;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use completion::{ApiKey, CompletionClient, CompletionRequest, OpenRouterClient};
pub use context::{ConversationHistory, ConversationStore};
pub use error::ChatError;
pub use orchestrator::{Archives, QueryResponse, QueryRouter, INVALID_MESSAGE, NO_IMAGE_MESSAGE};
pub use translator::QueryGenerator;
pub use validator::{clean_completion, QuerySchema};
