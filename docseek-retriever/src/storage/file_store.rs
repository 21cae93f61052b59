//! Two-artifact file store: a binary vector file plus a JSON metadata sidecar.
//!
//! Binary layout (all integers little-endian):
//!
//! ```text
//! "DSKFLAT1" | u32 dimension | u64 count | count * dimension f32 | blake3(all preceding bytes)
//! ```
//!
//! The sidecar shares the base path with a `json` extension and holds
//! `{ "chunks": [...], "sources": [...], "processed_pdfs": [...] }`.
//! Each artifact is written to a temporary file in the same directory and
//! renamed into place, so a reader never observes a half-written file.

use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{IndexStore, PersistedState};
use crate::error::PersistenceError;
use crate::retrieval::flat_index::FlatIndex;

const MAGIC: &[u8; 8] = b"DSKFLAT1";
const HEADER_LEN: usize = 8 + 4 + 8;
const CHECKSUM_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    chunks: Vec<String>,
    sources: Vec<String>,
    processed_pdfs: Vec<String>,
}

/// File-backed [`IndexStore`].
#[derive(Debug, Clone)]
pub struct FileStore {
    index_path: PathBuf,
    metadata_path: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `index_path`; the sidecar sits next to it.
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        let index_path = index_path.into();
        let metadata_path = metadata_path_for(&index_path);
        Self {
            index_path,
            metadata_path,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Hex blake3 checksum recorded at the end of the index artifact, if present.
    pub fn index_checksum(&self) -> Option<String> {
        let bytes = std::fs::read(&self.index_path).ok()?;
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return None;
        }
        Some(hex::encode(&bytes[bytes.len() - CHECKSUM_LEN..]))
    }
}

/// Sidecar path for an index artifact: same stem, `json` extension.
pub fn metadata_path_for(index_path: &Path) -> PathBuf {
    let candidate = index_path.with_extension("json");
    if candidate == index_path {
        // The index itself is named *.json; keep the two artifacts apart.
        index_path.with_extension("meta.json")
    } else {
        candidate
    }
}

pub(crate) fn encode_index(index: &FlatIndex) -> Vec<u8> {
    let dimension = index.dimension().unwrap_or(0);
    let count = index.len();

    let mut bytes = Vec::with_capacity(HEADER_LEN + index.as_slice().len() * 4 + CHECKSUM_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&(dimension as u32).to_le_bytes());
    bytes.extend_from_slice(&(count as u64).to_le_bytes());
    for value in index.as_slice() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    let checksum = blake3::hash(&bytes);
    bytes.extend_from_slice(checksum.as_bytes());
    bytes
}

pub(crate) fn decode_index(path: &Path, bytes: &[u8]) -> Result<FlatIndex, PersistenceError> {
    let corrupt = |reason: String| PersistenceError::CorruptIndex {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(corrupt(format!("file too short ({} bytes)", bytes.len())));
    }
    if &bytes[..8] != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }

    let (body, stored_checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if blake3::hash(body).as_bytes() != stored_checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    let dimension = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    let expected_body = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| corrupt(format!("implausible shape {count}x{dimension}")))?;
    if body.len() != expected_body {
        return Err(corrupt(format!(
            "expected {} bytes of vectors for {count}x{dimension}, found {}",
            expected_body - HEADER_LEN,
            body.len() - HEADER_LEN
        )));
    }
    if dimension == 0 && count > 0 {
        return Err(corrupt("zero dimension with stored vectors".to_string()));
    }

    let data: Vec<f32> = body[HEADER_LEN..]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    FlatIndex::from_raw(dimension, data).map_err(|e| corrupt(e.to_string()))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(io_err)?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
    temp.write_all(bytes).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, PersistenceError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            PersistenceError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[async_trait]
impl IndexStore for FileStore {
    async fn save(&self, state: &PersistedState) -> Result<(), PersistenceError> {
        state.validate()?;

        let index_bytes = encode_index(&state.index);
        let metadata = Metadata {
            chunks: state.chunks.clone(),
            sources: state.sources.clone(),
            processed_pdfs: state.processed.iter().cloned().collect(),
        };
        let metadata_bytes = serde_json::to_vec_pretty(&metadata).map_err(|source| {
            PersistenceError::CorruptMetadata {
                path: self.metadata_path.clone(),
                source,
            }
        })?;

        let store = self.clone();
        tokio::task::spawn_blocking(move || -> Result<(), PersistenceError> {
            // Vectors first: a crash between the renames leaves counts that disagree,
            // which load reports as inconsistent.
            write_atomic(&store.index_path, &index_bytes)?;
            write_atomic(&store.metadata_path, &metadata_bytes)?;
            Ok(())
        })
        .await??;

        info!(
            "Saved {} vectors and {} processed documents to {}",
            state.index.len(),
            state.processed.len(),
            self.describe()
        );
        Ok(())
    }

    async fn load(&self) -> Result<PersistedState, PersistenceError> {
        let store = self.clone();
        let state = tokio::task::spawn_blocking(move || -> Result<PersistedState, PersistenceError> {
            let index_bytes = read_artifact(&store.index_path)?;
            let metadata_bytes = read_artifact(&store.metadata_path)?;

            let index = decode_index(&store.index_path, &index_bytes)?;
            let metadata: Metadata = serde_json::from_slice(&metadata_bytes).map_err(|source| {
                PersistenceError::CorruptMetadata {
                    path: store.metadata_path.clone(),
                    source,
                }
            })?;

            Ok(PersistedState {
                index,
                chunks: metadata.chunks,
                sources: metadata.sources,
                processed: metadata.processed_pdfs.into_iter().collect(),
            })
        })
        .await??;

        state.validate()?;
        debug!(
            "Loaded {} vectors from {} ({} processed: {})",
            state.index.len(),
            self.describe(),
            state.processed.len(),
            state.processed.iter().join(", ")
        );
        Ok(state)
    }

    fn exists(&self) -> bool {
        self.index_path.is_file() && self.metadata_path.is_file()
    }

    fn describe(&self) -> String {
        format!(
            "{} (+ {})",
            self.index_path.display(),
            self.metadata_path.display()
        )
    }
}
