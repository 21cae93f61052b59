//! # docseek-embed
//!
//! Text embedding for docseek. Chunks and queries are mapped to fixed-dimension
//! `f32` vectors through the async [`EmbeddingProvider`] trait.
//!
//! ## Providers
//!
//! - [`FastEmbedProvider`]: local ONNX models through fastembed. The default model
//!   is all-MiniLM-L6-v2 (384 dimensions), downloaded once into the cache directory.
//! - [`HashingProvider`]: deterministic feature hashing. No model files, no network;
//!   used for offline runs and tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docseek_embed::{EmbedConfig, create_provider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = create_provider(&EmbedConfig::default()).await?;
//!
//! let texts = vec!["Derivatives and integrals".to_string(), "Cell mitosis".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.

pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;

use std::sync::Arc;

// Re-export main types for easy access
pub use config::{DEFAULT_DIMENSION, DEFAULT_MODEL_NAME, EmbedConfig, ProviderKind};
pub use error::{EmbedError, Result};
pub use hashing::HashingProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider};

/// Construct and initialize the provider selected by `config.provider`.
///
/// For fastembed this loads (and on first use downloads) the model, which can
/// take a while; callers on a request path should run it in the background.
pub async fn create_provider(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    match config.provider {
        ProviderKind::Fastembed => Ok(Arc::new(FastEmbedProvider::create(config.clone()).await?)),
        ProviderKind::Hashing => {
            tracing::info!(
                "Using hashing embeddings ({} dimensions)",
                config.hashing_dimension
            );
            Ok(Arc::new(HashingProvider::new(config.hashing_dimension)?))
        }
    }
}
