//! Core data models used throughout Docbot.
//!
//! These types represent the documents, chunks, and conversation turns that
//! flow through the ingestion, retrieval, and chat pipeline.

use serde::{Deserialize, Serialize};

/// A document discovered in the docs directory, before indexing.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Relative path within the docs root; doubles as the source name.
    pub source: String,
    /// Full file contents (UTF-8).
    pub body: String,
}

/// A chunk of a document's body text, the unit of retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic identifier: `{source}_chunk{index}`.
    pub id: String,
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Who produced a turn within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message within a session's conversation history.
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

/// A chunk returned by retrieval, ranked by similarity.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    pub score: f64,
}
