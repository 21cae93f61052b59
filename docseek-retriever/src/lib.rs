//! docseek-retriever: document indexing and similarity search over a folder of PDFs
//!
//! This crate turns a directory of documents into a searchable vector index,
//! keeps it up to date as new documents appear, and answers similarity queries
//! that can be scoped to documents whose names match a subject.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: text extraction, chunking, the flat vector index, the
//!   document engine and the directory watcher
//! - **[`storage`]**: snapshot persistence (binary index plus JSON sidecar)
//! - **[`service`]**: [`EngineHandle`], the explicitly owned, lazily or eagerly
//!   constructed engine shared by callers
//! - **[`config`]**: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docseek_retriever::{EngineHandle, RetrieverConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let handle = EngineHandle::from_config(RetrieverConfig::default());
//! handle.start(); // build or load in the background
//!
//! let engine = handle.wait_ready().await?;
//! let response = engine.search("integration by parts", 3, None).await?;
//! for hit in response.hits() {
//!     println!("[{}] {}", hit.source, hit.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! pdf_dir → TextExtractor → Chunking → Embeddings → FlatIndex → FileStore
//!    ↑                                                  ↓
//! DirectoryWatcher → DocumentEngine ← EngineHandle ← queries
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod service;
pub mod storage;

pub use config::RetrieverConfig;
pub use error::{EngineError, ExtractionError, IndexError, PersistenceError, Result};
pub use retrieval::engine::{
    DocumentEngine, EngineConfig, EngineState, EngineStats, IngestReport, SearchHit,
    SearchResponse,
};
pub use service::EngineHandle;
