//! Similarity retrieval over the passage index.

use std::time::Duration;

use async_trait::async_trait;
use rig::embeddings::EmbeddingModel;
use tokio::time::timeout;
use tracing::debug;

use crate::stores::SqlitePassageStore;
use crate::types::{ChatError, Passage};

/// Deadline for a single embed-and-search round trip.
const RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Seam between the pipeline and the concrete retrieval stack.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns the passages most similar to `question`, most similar
    /// first.
    async fn retrieve(&self, question: &str) -> Result<Vec<Passage>, ChatError>;
}

/// Binds the embedding model and the vector index with a fixed
/// similarity policy.
pub struct VectorRetriever<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    store: SqlitePassageStore<E>,
    model: E,
    top_k: usize,
    deadline: Duration,
}

impl<E> VectorRetriever<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    pub fn new(store: SqlitePassageStore<E>, model: E, top_k: usize) -> Self {
        Self {
            store,
            model,
            top_k,
            deadline: RETRIEVAL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

#[async_trait]
impl<E> Retriever for VectorRetriever<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    async fn retrieve(&self, question: &str) -> Result<Vec<Passage>, ChatError> {
        let embeddings = timeout(
            self.deadline,
            self.model.embed_texts(vec![question.to_string()]),
        )
        .await
        .map_err(|_| ChatError::Timeout(self.deadline))?
        .map_err(|err| ChatError::Embedding(err.to_string()))?;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Embedding("provider returned no embedding".to_string()))?;
        let query: Vec<f32> = embedding.vec.iter().map(|value| *value as f32).collect();

        let hits = timeout(self.deadline, self.store.search_similar(&query, self.top_k))
            .await
            .map_err(|_| ChatError::Timeout(self.deadline))??;

        debug!(hits = hits.len(), top_k = self.top_k, "similarity search");

        Ok(hits
            .into_iter()
            .map(|(doc, _similarity)| Passage::from(doc))
            .collect())
    }
}
