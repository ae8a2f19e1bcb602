//! Storage backend for the passage vector index.
//!
//! The index is an external artifact: it is produced by a separate
//! ingestion process and attached read-mostly at startup. The only
//! supported backend is SQLite with vector search via `sqlite-vec`;
//! [`sqlite::SqlitePassageStore`] owns both the document table and the
//! embeddings virtual table.

pub mod sqlite;

pub use sqlite::{PassageDocument, SqlitePassageStore};
