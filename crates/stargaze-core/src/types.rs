//! Domain types shared by the archive, chat and API crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation
// =============================================================================

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a conversation. Immutable once appended to a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// The five intents a question can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "GAIA")]
    Gaia,
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "GENERAL")]
    General,
    #[serde(rename = "INVALID")]
    Invalid,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Sql,
        Classification::Gaia,
        Classification::Image,
        Classification::General,
        Classification::Invalid,
    ];

    /// Canonical single-word tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Sql => "SQL",
            Classification::Gaia => "GAIA",
            Classification::Image => "IMAGE",
            Classification::General => "GENERAL",
            Classification::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label is not one of the canonical tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown classification label: {:?}", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl FromStr for Classification {
    type Err = UnknownLabel;

    /// Accepts only the exact canonical tags. Normalization of raw model
    /// output happens before this is called.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Query dialect understood by a tabular archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "ADQL")]
    Adql,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Sql => "SQL",
            QueryKind::Adql => "ADQL",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query string that passed shape validation for its dialect.
///
/// Only the chat validator constructs these for the live pipeline; archives
/// refuse to execute anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub kind: QueryKind,
    pub text: String,
}

// =============================================================================
// Images
// =============================================================================

/// A single image picked from the image archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub title: String,
    pub description: String,
    pub date_created: String,
    pub url: String,
}
