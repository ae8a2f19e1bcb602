use rig::OneOrMany;
use rig::embeddings::{Embedding, EmbeddingModel};
use rig_sqlite::{Column, ColumnValue, SqliteVectorStore, SqliteVectorStoreTable};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use crate::types::ChatError;

/// A passage row as stored in the index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassageDocument {
    pub id: String,
    pub source: String,
    pub section: String,
    pub content: String,
    #[serde(deserialize_with = "deserialize_metadata_field")]
    pub metadata: serde_json::Value,
}

impl SqliteVectorStoreTable for PassageDocument {
    fn name() -> &'static str {
        "passages"
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", "TEXT PRIMARY KEY"),
            Column::new("source", "TEXT").indexed(),
            Column::new("section", "TEXT"),
            Column::new("content", "TEXT"),
            Column::new("metadata", "TEXT"),
        ]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn column_values(&self) -> Vec<(&'static str, Box<dyn ColumnValue>)> {
        vec![
            ("id", Box::new(self.id.clone())),
            ("source", Box::new(self.source.clone())),
            ("section", Box::new(self.section.clone())),
            ("content", Box::new(self.content.clone())),
            ("metadata", Box::new(self.metadata.to_string())),
        ]
    }
}

fn deserialize_metadata_field<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if let serde_json::Value::String(raw) = value {
        serde_json::from_str(&raw).map_or(Ok(serde_json::Value::String(raw)), Ok)
    } else {
        Ok(value)
    }
}

/// SQLite-backed passage index with vector search via `sqlite-vec`.
#[derive(Clone)]
pub struct SqlitePassageStore<E>
where
    E: EmbeddingModel + 'static,
{
    inner: SqliteVectorStore<E, PassageDocument>,
    /// Separate connection handle for direct queries not supported by rig-sqlite.
    /// This is a clone of the connection used by the inner store.
    conn: Connection,
}

impl<E> std::fmt::Debug for SqlitePassageStore<E>
where
    E: EmbeddingModel + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePassageStore").finish_non_exhaustive()
    }
}

impl<E> SqlitePassageStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Attaches a pre-populated index.
    ///
    /// Fails when the database file is absent or does not contain the
    /// passages table; this system never creates the index on its own.
    pub async fn open_existing(path: impl AsRef<Path>, model: &E) -> Result<Self, ChatError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ChatError::Index(format!(
                "index database not found at {}",
                path.display()
            )));
        }

        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| ChatError::Index(err.to_string()))?;

        // The presence check must run before SqliteVectorStore::new,
        // which would otherwise create an empty passages table.
        let present = conn
            .call(|conn| {
                let name: Option<String> = conn
                    .query_row(
                        "SELECT name FROM sqlite_master WHERE type='table' AND name='passages'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(name.is_some())
            })
            .await
            .map_err(|err| ChatError::Index(err.to_string()))?;

        if !present {
            return Err(ChatError::Index(format!(
                "database at {} has no passages index",
                path.display()
            )));
        }

        Self::attach(conn, model).await
    }

    /// Opens (or initializes) an index database.
    ///
    /// Used by ingestion tooling and test fixtures; the service itself
    /// goes through [`SqlitePassageStore::open_existing`].
    pub async fn open(path: impl AsRef<Path>, model: &E) -> Result<Self, ChatError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| ChatError::Index(err.to_string()))?;
        Self::attach(conn, model).await
    }

    async fn attach(conn: Connection, model: &E) -> Result<Self, ChatError> {
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await
        .map_err(|err| ChatError::Index(err.to_string()))?;
        // Clone connection for direct access before moving into store
        let conn_for_queries = conn.clone();
        let store = SqliteVectorStore::new(conn, model)
            .await
            .map_err(|err| ChatError::Index(err.to_string()))?;
        Ok(Self {
            inner: store,
            conn: conn_for_queries,
        })
    }

    /// Inserts passages paired with their embeddings.
    pub async fn add_passages(
        &self,
        documents: Vec<(PassageDocument, Vec<f32>)>,
    ) -> Result<(), ChatError> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(documents.len());
        for (doc, embedding) in documents {
            let converted: Vec<f64> = embedding.into_iter().map(|value| value as f64).collect();
            let embed = Embedding {
                document: doc.content.clone(),
                vec: converted,
            };
            rows.push((doc, OneOrMany::one(embed)));
        }
        self.inner
            .add_rows(rows)
            .await
            .map_err(|err| ChatError::Index(err.to_string()))?;
        Ok(())
    }

    /// Cosine similarity search over the embeddings table.
    ///
    /// Returns passages ordered most similar first, limited to `top_k`.
    pub async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(PassageDocument, f32)>, ChatError> {
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| ChatError::Index(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT p.id, p.source, p.section, p.content, p.metadata, \
                         vec_distance_cosine(e.embedding, vec_f32(?)) as distance \
                         FROM passages p \
                         JOIN passages_embeddings e ON e.rowid = p.rowid \
                         ORDER BY distance ASC \
                         LIMIT {}",
                        top_k
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let doc = PassageDocument {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            section: row.get(2)?,
                            content: row.get(3)?,
                            metadata: row
                                .get::<_, String>(4)
                                .map(|s| serde_json::from_str(&s).unwrap_or_default())
                                .unwrap_or_default(),
                        };
                        let distance: f32 = row.get(5)?;
                        // Convert distance to similarity (1 - distance for cosine)
                        let similarity = 1.0 - distance;
                        Ok((doc, similarity))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| ChatError::Index(err.to_string()))
    }

    /// Total number of stored passages.
    pub async fn count(&self) -> Result<usize, ChatError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| ChatError::Index(err.to_string()))
    }

    fn register_sqlite_vec() -> Result<(), ChatError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(ChatError::Index)
    }
}
