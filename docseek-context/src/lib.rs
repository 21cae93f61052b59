pub mod text;

// Re-export the main chunking entry points for external use
pub use text::{
    ChunkerError, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, TextChunk, WindowChunker, chunk_text,
};
