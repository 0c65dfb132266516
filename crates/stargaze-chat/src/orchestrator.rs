//! Query router: central coordinator wiring classification, generation,
//! archives and conversation history.
//!
//! One call to [`QueryRouter::handle`] is one request cycle: the user turn
//! is recorded, the utterance is classified, the matching generator and
//! archive produce a typed [`QueryResponse`], and a single assistant turn
//! closes the cycle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use stargaze_archive::{ImageSearch, TabularArchive};
use stargaze_core::config::ConversationConfig;
use stargaze_core::{Classification, GeneratedQuery, ImageResult, Turn};

use crate::context::ConversationStore;
use crate::error::ChatError;
use crate::translator::QueryGenerator;

/// Returned for utterances classified as not astronomy-related.
pub const INVALID_MESSAGE: &str = "Please ask an astronomy-related question.";

/// Returned when the image search finds nothing usable.
pub const NO_IMAGE_MESSAGE: &str = "No image found.";

const INVALID_TURN: &str = "Invalid question.";

/// Typed result of one request, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueryResponse {
    #[serde(rename = "SQL")]
    Sql { sql: String, data: Value },
    #[serde(rename = "GAIA")]
    Gaia { adql: String, data: Value },
    #[serde(rename = "IMAGE")]
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<ImageResult>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "GENERAL")]
    General { answer: String },
    #[serde(rename = "INVALID")]
    Invalid { message: String },
}

impl QueryResponse {
    pub fn classification(&self) -> Classification {
        match self {
            QueryResponse::Sql { .. } => Classification::Sql,
            QueryResponse::Gaia { .. } => Classification::Gaia,
            QueryResponse::Image { .. } => Classification::Image,
            QueryResponse::General { .. } => Classification::General,
            QueryResponse::Invalid { .. } => Classification::Invalid,
        }
    }
}

/// Data services the router dispatches to.
#[derive(Clone)]
pub struct Archives {
    pub exoplanets: Arc<dyn TabularArchive>,
    pub gaia: Arc<dyn TabularArchive>,
    pub images: Arc<dyn ImageSearch>,
}

/// Routes each utterance to the generator and archive that can answer it.
pub struct QueryRouter {
    generator: QueryGenerator,
    archives: Archives,
    store: ConversationStore,
    retain_failed_turns: bool,
    max_query_chars: usize,
}

impl QueryRouter {
    pub fn new(
        generator: QueryGenerator,
        archives: Archives,
        conversation: &ConversationConfig,
        max_query_chars: usize,
    ) -> Self {
        Self {
            generator,
            archives,
            store: ConversationStore::new(conversation),
            retain_failed_turns: conversation.retain_failed_turns,
            max_query_chars,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Handle one utterance for `user_id`.
    ///
    /// Input checks run before anything is recorded. Requests for the same
    /// user are serialized on that user's history lock.
    pub async fn handle(&self, user_id: &str, text: &str) -> Result<QueryResponse, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.max_query_chars {
            return Err(ChatError::MessageTooLong(self.max_query_chars));
        }

        let span = tracing::info_span!(
            "query",
            request_id = %Uuid::new_v4(),
            user_id = %user_id
        );
        self.run_cycle(user_id, text).instrument(span).await
    }

    async fn run_cycle(&self, user_id: &str, text: &str) -> Result<QueryResponse, ChatError> {
        let history = self.store.checkout(user_id)?;
        let mut history = history.lock().await;

        let prior = history.turns().to_vec();
        history.append(Turn::user(text));

        match self.dispatch(text, &prior).await {
            Ok((response, assistant_turn)) => {
                history.append(Turn::assistant(assistant_turn));
                history.trim();
                tracing::info!(
                    classification = %response.classification(),
                    turns = history.len(),
                    "Query handled"
                );
                Ok(response)
            }
            Err(e) => {
                if self.retain_failed_turns {
                    history.trim();
                } else {
                    history.pop();
                }
                tracing::error!(error = %e, "Query failed");
                Err(e)
            }
        }
    }

    /// Produce the response and the content of the closing assistant turn.
    async fn dispatch(
        &self,
        text: &str,
        prior: &[Turn],
    ) -> Result<(QueryResponse, String), ChatError> {
        let classification = self.generator.classify(text, prior).await?;

        match classification {
            Classification::Sql => {
                let query = self.generator.generate_sql(text, prior).await?;
                let data = fetch(self.archives.exoplanets.as_ref(), &query).await?;
                let turn = format!("SQL: {}", query.text);
                Ok((QueryResponse::Sql { sql: query.text, data }, turn))
            }
            Classification::Gaia => {
                let query = self.generator.generate_adql(text, prior).await?;
                let data = fetch(self.archives.gaia.as_ref(), &query).await?;
                let turn = format!("ADQL: {}", query.text);
                Ok((QueryResponse::Gaia { adql: query.text, data }, turn))
            }
            Classification::Image => match self.archives.images.find_image(text).await {
                Some(image) => {
                    let turn = format!("Image: {}", image.title);
                    Ok((
                        QueryResponse::Image {
                            image: Some(image),
                            message: None,
                        },
                        turn,
                    ))
                }
                None => Ok((
                    QueryResponse::Image {
                        image: None,
                        message: Some(NO_IMAGE_MESSAGE.to_string()),
                    },
                    NO_IMAGE_MESSAGE.to_string(),
                )),
            },
            Classification::General => {
                let answer = self.generator.answer_general(text, prior).await?;
                let turn = answer.clone();
                Ok((QueryResponse::General { answer }, turn))
            }
            Classification::Invalid => Ok((
                QueryResponse::Invalid {
                    message: INVALID_MESSAGE.to_string(),
                },
                INVALID_TURN.to_string(),
            )),
        }
    }
}

async fn fetch(archive: &dyn TabularArchive, query: &GeneratedQuery) -> Result<Value, ChatError> {
    tracing::info!(archive = archive.name(), dialect = %archive.dialect(), "Querying archive");
    let data = archive.query(query).await.inspect_err(|e| {
        tracing::warn!(archive = archive.name(), error = %e, "Archive query failed");
    })?;
    Ok(data)
}
