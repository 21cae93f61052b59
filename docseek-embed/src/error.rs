//! Error types for the embedding system

use std::path::PathBuf;

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems, model loading failures and runtime failures
/// while generating vectors. Model and backend failures are reported through
/// [`EmbedError::ModelInitialization`] and [`EmbedError::EmbeddingGeneration`] so
/// callers can tell "the model never loaded" apart from "this batch failed".
///
/// # Error Categories
///
/// - **Configuration Errors**: Unknown model names, invalid batch sizes, unusable cache directories
/// - **Initialization Errors**: Failures during model download or loading
/// - **Runtime Errors**: Problems during embedding generation or malformed model output
/// - **IO Errors**: File system access issues
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The configured model name does not map to a supported model
    #[error("Unknown embedding model: {name}")]
    UnknownModel { name: String },

    /// The model cache directory cannot be used
    #[error("Model cache directory unavailable: {path}")]
    CacheDirUnavailable { path: PathBuf },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The model returned vectors of an unexpected shape
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// IO errors when reading model files
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    ///
    /// # Arguments
    /// * `source` - The underlying error that caused the initialization failure
    pub fn model_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Create an embedding generation error from any error type.
    ///
    /// # Arguments
    /// * `source` - The underlying error that caused the embedding generation failure
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
