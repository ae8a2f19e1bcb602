//! Shared error taxonomy and the backend-agnostic passage record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stores::sqlite::PassageDocument;

/// Errors surfaced by the retrieval/generation pipeline.
///
/// Configuration problems are covered separately by
/// [`crate::config::ConfigError`]; everything here happens after a
/// successfully configured startup.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The vector index is unreachable, malformed, or missing entirely.
    #[error("vector index unavailable: {0}")]
    Index(String),

    /// Embedding the query failed.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// The completion call failed or returned an unusable reply.
    #[error("completion request failed: {0}")]
    Completion(String),

    /// An upstream call exceeded its deadline.
    #[error("upstream call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A stored text passage returned as retrieved context.
///
/// Backend-agnostic counterpart of the sqlite document type; up to
/// `top_k` of these travel through a single request and are never
/// cached across requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Unique identifier of the passage in the index.
    pub id: String,
    /// Source document the passage was taken from.
    pub source: String,
    /// Section or heading context within the source.
    pub section: String,
    /// The passage text handed to the generator.
    pub content: String,
    /// Free-form metadata recorded at ingestion time.
    pub metadata: serde_json::Value,
}

impl Passage {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        section: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            section: section.into(),
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl From<PassageDocument> for Passage {
    fn from(doc: PassageDocument) -> Self {
        Passage {
            id: doc.id,
            source: doc.source,
            section: doc.section,
            content: doc.content,
            metadata: doc.metadata,
        }
    }
}

impl From<Passage> for PassageDocument {
    fn from(passage: Passage) -> Self {
        PassageDocument {
            id: passage.id,
            source: passage.source,
            section: passage.section,
            content: passage.content,
            metadata: passage.metadata,
        }
    }
}
