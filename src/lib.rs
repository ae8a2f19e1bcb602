//! Retrieval-augmented question answering for a medical knowledge base,
//! served over HTTP.
//!
//! ```text
//! GET /            ──► static chat page
//! GET|POST /get    ──► server::ask ──► RagPipeline::answer
//!                                          │
//!                      VectorRetriever ◄───┤
//!                         │      │         │
//!        Gemini embeddings┘      └► sqlite-vec index (pre-populated)
//!                                          │
//!                      PromptTemplate::compose (context + question)
//!                                          │
//!                      ChatGenerator ──► Gemini completion
//!                                          │
//!                      plain-text answer ◄─┘
//! ```
//!
//! The pipeline is assembled once at startup from [`config::AppConfig`]
//! and shared immutably across request handlers. The vector index is an
//! external, pre-populated artifact; this crate never writes to it in
//! normal operation.

pub mod config;
pub mod generator;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod server;
pub mod stores;
pub mod telemetry;
pub mod types;

pub use pipeline::RagPipeline;
