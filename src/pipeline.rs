//! Assembly of the retrieve-then-generate pipeline.

use std::sync::Arc;

use rig::client::{CompletionClient, EmbeddingsClient};
use rig::providers::gemini;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::generator::{ChatGenerator, Generator};
use crate::prompt::PromptTemplate;
use crate::retriever::{Retriever, VectorRetriever};
use crate::stores::SqlitePassageStore;
use crate::types::ChatError;

/// Embedding model the index was populated with; queries must use the
/// same model and dimension count.
const EMBEDDING_MODEL: &str = "text-embedding-004";
const EMBEDDING_DIMS: usize = 768;

/// The process-wide retrieve-then-generate pipeline.
///
/// Built once at startup and shared immutably across request handlers;
/// a credential or index change requires a restart.
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        template: PromptTemplate,
    ) -> Self {
        Self {
            retriever,
            generator,
            template,
        }
    }

    /// Builds the production pipeline from validated configuration.
    ///
    /// Connects the Gemini client, attaches the pre-populated passage
    /// index, and wires retriever and generator together. Called once,
    /// from `main`, before the listener binds.
    pub async fn connect(config: &AppConfig) -> Result<Self, ChatError> {
        info!("building retrieval pipeline");

        let client = gemini::Client::new(&config.gemini_api_key)
            .map_err(|err| ChatError::Embedding(err.to_string()))?;
        let embedding_model = client.embedding_model_with_ndims(EMBEDDING_MODEL, EMBEDDING_DIMS);

        let store = SqlitePassageStore::open_existing(&config.index_db, &embedding_model).await?;
        let passages = store.count().await?;
        info!(
            index = %config.index_db.display(),
            passages,
            "vector index attached"
        );

        let retriever = VectorRetriever::new(store, embedding_model, config.top_k);
        let generator = ChatGenerator::new(client.completion_model(&config.chat_model));
        info!(model = %config.chat_model, top_k = config.top_k, "pipeline ready");

        Ok(Self::new(
            Arc::new(retriever),
            Arc::new(generator),
            PromptTemplate::medical_assistant(),
        ))
    }

    /// Runs one question through retrieve → compose → generate.
    pub async fn answer(&self, question: &str) -> Result<String, ChatError> {
        let passages = self.retriever.retrieve(question).await?;
        debug!(passages = passages.len(), "retrieved context");

        let prompt = self.template.compose(&passages, question);
        self.generator.generate(&prompt).await
    }
}
