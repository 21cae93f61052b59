//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the default sentence-embedding model.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Output dimension of [`DEFAULT_MODEL_NAME`], also used by the hashing provider.
pub const DEFAULT_DIMENSION: usize = 384;

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local ONNX model run through fastembed
    #[default]
    Fastembed,
    /// Deterministic feature hashing, no model files needed
    Hashing,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" => Ok(ProviderKind::Fastembed),
            "hashing" => Ok(ProviderKind::Hashing),
            _ => Err(format!("Invalid embedding provider: {s}")),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Fastembed => write!(f, "fastembed"),
            ProviderKind::Hashing => write!(f, "hashing"),
        }
    }
}

/// Configuration for embedding providers
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Backend used to generate vectors
    #[builder(default)]
    pub provider: ProviderKind,
    /// Name of the embedding model to use (fastembed only)
    #[builder(default = "DEFAULT_MODEL_NAME.to_string()")]
    pub model_name: String,
    /// Directory where downloaded model files are cached (fastembed only)
    #[builder(default)]
    pub cache_dir: Option<PathBuf>,
    /// Maximum number of texts sent to the model at once
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    #[builder(default = "true")]
    pub normalize: bool,
    /// Whether to print model download progress
    #[builder(default = "true")]
    pub show_download_progress: bool,
    /// Output dimension of the hashing provider
    #[builder(default = "DEFAULT_DIMENSION")]
    pub hashing_dimension: usize,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a fastembed configuration for the named model
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Create a hashing configuration with the given output dimension
    pub fn hashing(dimension: usize) -> Self {
        Self {
            provider: ProviderKind::Hashing,
            hashing_dimension: dimension,
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: Some(cache_dir.as_ref().to_path_buf()),
            ..self
        }
    }

    /// Set the backend (builder style)
    pub fn with_provider(self, provider: ProviderKind) -> Self {
        Self { provider, ..self }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolve the configured model name to a fastembed model.
    ///
    /// Accepts the short sentence-transformers names as well as the
    /// `sentence-transformers/` and `BAAI/` prefixed forms.
    pub fn fastembed_model(&self) -> Result<EmbeddingModel> {
        let name = self.model_name.to_lowercase();
        let short = name.rsplit('/').next().unwrap_or(&name);
        match short {
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
            _ => Err(EmbedError::UnknownModel {
                name: self.model_name.clone(),
            }),
        }
    }

    /// Validate the configuration without loading any model
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }

        match self.provider {
            ProviderKind::Fastembed => {
                self.fastembed_model()?;
                if let Some(dir) = &self.cache_dir {
                    if dir.exists() && !dir.is_dir() {
                        tracing::error!("Model cache path is not a directory: {}", dir.display());
                        return Err(EmbedError::CacheDirUnavailable { path: dir.clone() });
                    }
                }
            }
            ProviderKind::Hashing => {
                if self.hashing_dimension == 0 {
                    return Err(EmbedError::invalid_config(
                        "hashing_dimension must be at least 1",
                    ));
                }
            }
        }

        tracing::debug!("Embedding configuration valid for: {}", self.model_name);
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Fastembed,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: None,
            batch_size: 32,
            normalize: true,
            show_download_progress: true,
            hashing_dimension: DEFAULT_DIMENSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = EmbedConfig::default();

        assert_eq!(config.provider, ProviderKind::Fastembed);
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, 32);
        assert!(config.normalize);
        assert_eq!(config.hashing_dimension, 384);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_methods() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::new("bge-small-en-v1.5")
            .with_batch_size(8)
            .with_normalize(false)
            .with_cache_dir(temp_dir.path());

        assert_eq!(config.batch_size, 8);
        assert!(!config.normalize);
        assert_eq!(config.cache_dir.as_deref(), Some(temp_dir.path()));
        assert!(matches!(
            config.fastembed_model(),
            Ok(EmbeddingModel::BGESmallENV15)
        ));
    }

    #[test]
    fn test_derive_builder_pattern() {
        let config = EmbedConfig::builder()
            .provider(ProviderKind::Hashing)
            .hashing_dimension(64usize)
            .batch_size(4usize)
            .build()
            .unwrap();

        assert_eq!(config.provider, ProviderKind::Hashing);
        assert_eq!(config.hashing_dimension, 64);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert!(config.normalize);
    }

    #[test]
    fn test_model_name_resolution() {
        for name in [
            "all-MiniLM-L6-v2",
            "sentence-transformers/all-MiniLM-L6-v2",
            "ALL-MINILM-L6-V2",
        ] {
            let model = EmbedConfig::new(name).fastembed_model().unwrap();
            assert!(matches!(model, EmbeddingModel::AllMiniLML6V2), "{name}");
        }

        let err = EmbedConfig::new("gpt-embeddings-9000")
            .fastembed_model()
            .unwrap_err();
        assert!(matches!(err, EmbedError::UnknownModel { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(EmbedConfig::default().with_batch_size(0).validate().is_err());
        assert!(EmbedConfig::hashing(0).validate().is_err());
        assert!(EmbedConfig::new("unknown-model").validate().is_err());
        // Unknown model names don't matter to the hashing provider.
        assert!(
            EmbedConfig::new("unknown-model")
                .with_provider(ProviderKind::Hashing)
                .validate()
                .is_ok()
        );

        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let err = EmbedConfig::default().with_cache_dir(&file).validate().unwrap_err();
        assert!(matches!(err, EmbedError::CacheDirUnavailable { .. }));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: EmbedConfig =
            serde_json::from_str(r#"{"provider": "hashing", "hashing_dimension": 128}"#).unwrap();

        assert_eq!(config.provider, ProviderKind::Hashing);
        assert_eq!(config.hashing_dimension, 128);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("hashing".parse::<ProviderKind>(), Ok(ProviderKind::Hashing));
        assert_eq!("FastEmbed".parse::<ProviderKind>(), Ok(ProviderKind::Fastembed));
        assert!("openai".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::Hashing.to_string(), "hashing");
    }
}
