//! Storage abstraction layer for docseek-retriever
//!
//! The retrieval engine keeps its whole corpus in memory and snapshots it to
//! durable storage after each ingestion pass. This module defines the snapshot
//! type and the [`IndexStore`] trait; [`file_store::FileStore`] is the concrete
//! two-artifact implementation.
//!
//! ## Architecture
//!
//! ```text
//! DocumentEngine ── PersistedState ── IndexStore ── FileStore
//!                                                    ├─ <base>.idx   (vectors, blake3 checked)
//!                                                    └─ <base>.json  (chunks, sources, processed_pdfs)
//! ```

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::PersistenceError;
use crate::retrieval::flat_index::FlatIndex;

pub mod file_store;

/// Everything needed to restore an engine without re-embedding.
///
/// `chunks[i]` and `sources[i]` describe vector `i` of `index`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub index: FlatIndex,
    pub chunks: Vec<String>,
    pub sources: Vec<String>,
    pub processed: BTreeSet<String>,
}

impl PersistedState {
    /// Check the parallel-array invariant.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        let vectors = self.index.len();
        if vectors != self.chunks.len() || vectors != self.sources.len() {
            return Err(PersistenceError::Inconsistent {
                vectors,
                chunks: self.chunks.len(),
                sources: self.sources.len(),
            });
        }
        Ok(())
    }
}

/// Durable snapshot storage for one engine.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Replace any prior snapshot with `state`.
    async fn save(&self, state: &PersistedState) -> Result<(), PersistenceError>;

    /// Read back the last snapshot, validating it.
    async fn load(&self) -> Result<PersistedState, PersistenceError>;

    /// Whether a complete snapshot exists, without loading it.
    fn exists(&self) -> bool;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}
