//! Scripted collaborators shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use stargaze_archive::{ArchiveError, ImageSearch, TabularArchive};
use stargaze_core::{GeneratedQuery, ImageResult, QueryKind};

use crate::completion::{CompletionClient, CompletionRequest};
use crate::error::ChatError;

/// One scripted completion outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Status(u16),
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

/// Completion client that replays a fixed script and records every request.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(text.trim().to_string()),
            Some(Reply::Status(status)) => Err(ChatError::CompletionStatus {
                status,
                body: "scripted failure".to_string(),
            }),
            None => Err(ChatError::Transport("script exhausted".to_string())),
        }
    }
}

/// Archive that records queries and answers with a fixed body or status.
pub struct MockArchive {
    dialect: QueryKind,
    reply: Result<Value, u16>,
    queries: Mutex<Vec<GeneratedQuery>>,
}

impl MockArchive {
    pub fn ok(dialect: QueryKind, data: Value) -> Self {
        Self {
            dialect,
            reply: Ok(data),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(dialect: QueryKind, status: u16) -> Self {
        Self {
            dialect,
            reply: Err(status),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<GeneratedQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabularArchive for MockArchive {
    fn name(&self) -> &'static str {
        "Mock archive"
    }

    fn dialect(&self) -> QueryKind {
        self.dialect
    }

    async fn query(&self, query: &GeneratedQuery) -> Result<Value, ArchiveError> {
        self.queries.lock().unwrap().push(query.clone());
        match &self.reply {
            Ok(data) => Ok(data.clone()),
            Err(status) => Err(ArchiveError::Upstream {
                service: "Mock archive",
                status: *status,
                body: "scripted failure".to_string(),
            }),
        }
    }
}

/// Image search returning a fixed result and counting calls.
pub struct MockImages {
    result: Option<ImageResult>,
    calls: AtomicUsize,
}

impl MockImages {
    pub fn new(result: Option<ImageResult>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSearch for MockImages {
    async fn find_image(&self, _text: &str) -> Option<ImageResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
