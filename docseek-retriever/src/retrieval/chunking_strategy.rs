use docseek_context::{ChunkerError, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, TextChunk, WindowChunker};
use std::path::Path;

/// Configuration for chunking documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Window length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub overlap: usize,
    /// File extension (without the dot) of documents that get indexed
    pub extension: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            extension: "pdf".to_string(),
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            ..Self::default()
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

/// Strategy for chunking documents - delegates the windowing to docseek-context
#[derive(Debug, Clone)]
pub struct ChunkingStrategy {
    config: ChunkingConfig,
    chunker: WindowChunker,
}

impl ChunkingStrategy {
    /// Create a new chunking strategy, validating the window.
    pub fn new(config: ChunkingConfig) -> Result<Self, ChunkerError> {
        let chunker = WindowChunker::new(config.chunk_size, config.overlap)?;
        Ok(Self { config, chunker })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk a document's text. Whitespace-only text yields no chunks.
    pub fn chunk_content(&self, source: &str, content: &str) -> Vec<TextChunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let chunks = self.chunker.get_chunks(source, content);

        tracing::debug!(
            "Chunked {} into {} chunks (size {}, overlap {})",
            source,
            chunks.len(),
            self.config.chunk_size,
            self.config.overlap
        );

        chunks
    }

    /// Check if a file should be indexed based on its path
    pub fn should_index_file(&self, file_path: &Path) -> bool {
        if let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) {
            if filename.starts_with('.') {
                return false;
            }
        }

        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.config.extension))
    }
}
