//! Error types for extraction, indexing, persistence and the retrieval engine.

use std::path::PathBuf;

use crate::retrieval::engine::EngineState;

/// A document could not be turned into text. Ingestion skips the document and continues.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path} is not valid UTF-8 text")]
    Encoding { path: PathBuf },

    #[error("extraction task failed: {source}")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },
}

/// Vector index misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector dimension must be at least 1")]
    ZeroDimension,

    #[error("vector position {position} out of range for index of {len} vectors")]
    OutOfRange { position: usize, len: usize },
}

/// The persisted store is missing, unreadable or inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("no persisted store at {path}")]
    Missing { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt index artifact {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("corrupt metadata artifact {path}: {source}")]
    CorruptMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "inconsistent store: {vectors} vectors, {chunks} chunks, {sources} sources"
    )]
    Inconsistent {
        vectors: usize,
        chunks: usize,
        sources: usize,
    },

    #[error("stored vectors are {stored}-d but the embedder produces {expected}-d vectors")]
    IncompatibleDimension { stored: usize, expected: usize },

    #[error("persistence task failed: {source}")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },
}

/// Errors surfaced at the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] docseek_embed::EmbedError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// The query could not be turned into a usable vector.
    #[error("query failed: {message}")]
    Query { message: String },

    /// The engine has not finished construction.
    #[error("document engine is not ready (state: {state})")]
    NotReady { state: EngineState },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn query<S: Into<String>>(message: S) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for conditions that go away on their own once construction finishes.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
