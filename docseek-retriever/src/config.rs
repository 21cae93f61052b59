//! TOML configuration for the retriever.
//!
//! ```toml
//! [engine]
//! pdf_dir = "data/College_PDFs"
//! store_path = "index_data.idx"
//! chunk_size = 1000
//! overlap = 200
//!
//! [embedding]
//! provider = "fastembed"
//! model_name = "all-MiniLM-L6-v2"
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use docseek_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::retrieval::engine::EngineConfig;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "docseek.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub engine: EngineConfig,
    pub embedding: EmbedConfig,
}

impl RetrieverConfig {
    /// Load from `path`. A file that does not exist yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let config = Self::from_toml_str(&raw)
                    .map_err(|e| EngineError::config(format!("{}: {}", path.display(), e)))?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| EngineError::config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.embedding.validate()?;
        Ok(())
    }
}
