//! Integration tests for the sqlite-vec passage store and the vector
//! retriever, using a deterministic hash embedding model so results are
//! stable in CI.

use rig::embeddings::embedding::{Embedding, EmbeddingError, EmbeddingModel};

use medichat::retriever::{Retriever, VectorRetriever};
use medichat::stores::{PassageDocument, SqlitePassageStore};
use medichat::types::ChatError;

#[derive(Clone)]
struct HashEmbeddingModel;

impl EmbeddingModel for HashEmbeddingModel {
    const MAX_DOCUMENTS: usize = 64;

    type Client = ();

    fn make(_client: &Self::Client, _model: impl Into<String>, _dims: Option<usize>) -> Self {
        HashEmbeddingModel
    }

    fn ndims(&self) -> usize {
        8
    }

    fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        let docs: Vec<String> = texts.into_iter().collect();
        async move {
            Ok(docs
                .into_iter()
                .map(|document| Embedding {
                    vec: hash_to_vec(&document),
                    document,
                })
                .collect())
        }
    }
}

fn hash_to_vec(text: &str) -> Vec<f64> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..8)
        .map(|i| {
            let bits = seed.rotate_left((i * 8) as u32) ^ ((i as u64) << 24);
            (bits as f64) / u32::MAX as f64
        })
        .collect()
}

fn passage(id: &str, section: &str, content: &str) -> (PassageDocument, Vec<f32>) {
    let doc = PassageDocument {
        id: id.to_string(),
        source: "medical-handbook".to_string(),
        section: section.to_string(),
        content: content.to_string(),
        metadata: serde_json::json!({"section": section}),
    };
    let embedding = hash_to_vec(content)
        .into_iter()
        .map(|value| value as f32)
        .collect();
    (doc, embedding)
}

fn sample_passages() -> Vec<(PassageDocument, Vec<f32>)> {
    vec![
        passage("p1", "Analgesics", "Aspirin relieves pain."),
        passage("p2", "Analgesics", "Ibuprofen reduces inflammation and swelling."),
        passage("p3", "Antibiotics", "Amoxicillin treats bacterial infections."),
        passage("p4", "Cardiology", "Beta blockers lower blood pressure."),
    ]
}

async fn populated_store(
    dir: &tempfile::TempDir,
) -> SqlitePassageStore<HashEmbeddingModel> {
    let path = dir.path().join("passages.sqlite");
    let store = SqlitePassageStore::open(&path, &HashEmbeddingModel)
        .await
        .expect("create store");
    store
        .add_passages(sample_passages())
        .await
        .expect("insert passages");
    store
}

#[tokio::test]
async fn open_existing_rejects_missing_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nowhere.sqlite");

    let err = SqlitePassageStore::open_existing(&path, &HashEmbeddingModel)
        .await
        .expect_err("must fail");
    assert!(matches!(err, ChatError::Index(_)));
}

#[tokio::test]
async fn open_existing_rejects_database_without_passages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.sqlite");
    std::fs::File::create(&path).expect("touch db file");

    let err = SqlitePassageStore::open_existing(&path, &HashEmbeddingModel)
        .await
        .expect_err("must fail");
    assert!(matches!(err, ChatError::Index(_)));
}

#[tokio::test]
async fn open_existing_attaches_populated_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("passages.sqlite");
    {
        let store = SqlitePassageStore::open(&path, &HashEmbeddingModel)
            .await
            .expect("create store");
        store
            .add_passages(sample_passages())
            .await
            .expect("insert passages");
    }

    let reopened = SqlitePassageStore::open_existing(&path, &HashEmbeddingModel)
        .await
        .expect("attach index");
    assert_eq!(reopened.count().await.expect("count"), 4);
}

#[tokio::test]
async fn search_returns_most_similar_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = populated_store(&dir).await;

    let query: Vec<f32> = hash_to_vec("Amoxicillin treats bacterial infections.")
        .into_iter()
        .map(|value| value as f32)
        .collect();
    let hits = store.search_similar(&query, 3).await.expect("search");

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].0.id, "p3");
    assert!(hits[0].1 > 0.99, "exact match similarity was {}", hits[0].1);
    for pair in hits.windows(2) {
        assert!(
            pair[0].1 >= pair[1].1,
            "results must be ordered by similarity"
        );
    }
}

#[tokio::test]
async fn search_honors_top_k() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = populated_store(&dir).await;

    let query: Vec<f32> = hash_to_vec("Aspirin relieves pain.")
        .into_iter()
        .map(|value| value as f32)
        .collect();

    let hits = store.search_similar(&query, 2).await.expect("search");
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn retriever_embeds_the_question_and_returns_passages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = populated_store(&dir).await;
    let retriever = VectorRetriever::new(store, HashEmbeddingModel, 3);

    let passages = retriever
        .retrieve("Beta blockers lower blood pressure.")
        .await
        .expect("retrieve");

    assert_eq!(passages.len(), 3);
    assert_eq!(passages[0].content, "Beta blockers lower blood pressure.");
    assert_eq!(passages[0].source, "medical-handbook");
}

#[tokio::test]
async fn count_tracks_inserts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("passages.sqlite");
    let store = SqlitePassageStore::open(&path, &HashEmbeddingModel)
        .await
        .expect("create store");

    assert_eq!(store.count().await.expect("count"), 0);
    store
        .add_passages(sample_passages())
        .await
        .expect("insert passages");
    assert_eq!(store.count().await.expect("count"), 4);
}
