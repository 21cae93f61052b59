//! Document engine that orchestrates the complete retrieval pipeline.
//!
//! The engine owns an embedder, a text extractor, an in-memory corpus (the flat
//! index plus parallel chunk and source arrays and the processed-set) and the
//! file store that snapshots it. It coordinates document discovery, extraction,
//! chunking, embedding and persistence, and answers similarity queries.
//!
//! ## Pipeline Flow
//!
//! ```text
//! pdf_dir → TextExtractor → ChunkingStrategy → EmbeddingProvider → FlatIndex
//!                                                                    ↓
//!                                   query → embed → search ← corpus (RwLock)
//!                                                                    ↓
//!                                                               FileStore
//! ```
//!
//! ## Lifecycle
//!
//! Construction drives the engine through an explicit state machine that is
//! published on a [`tokio::sync::watch`] channel:
//!
//! - A persisted store exists: `Loading → Loaded`, then any documents missing
//!   from the processed-set are ingested, then `Ready`.
//! - No store, or an unusable one with `rebuild_on_corrupt_store`: `Building`,
//!   every document is ingested and the result persisted, then `Ready`.
//! - Any fatal error: `Failed(reason)`.
//!
//! ## Concurrency
//!
//! Ingestion passes are serialized by an internal mutex. Queries only take the
//! corpus read lock, so they run in parallel with each other and only wait for
//! the short commit step of an ingestion pass, never for extraction or embedding.
//!
//! ## Known limitation
//!
//! Ingestion is keyed by file name. A document whose content changes after it
//! was first indexed keeps its original chunks until the store is rebuilt.
//!
//! A document whose text is blank (a scanned PDF without a text layer, for
//! example) contributes no chunks and is never marked processed, so it is
//! extracted again on every ingestion pass and every watcher event that
//! names it.

use chrono::{DateTime, Utc};
use docseek_embed::{EmbedError, EmbeddingProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, error, info, warn};

use super::chunking_strategy::{ChunkingConfig, ChunkingStrategy};
use super::extractor::TextExtractor;
use crate::error::{EngineError, PersistenceError, Result};
use crate::storage::file_store::FileStore;
use crate::storage::{IndexStore, PersistedState};

/// Configuration for the document engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory scanned (non-recursively) for documents
    pub pdf_dir: PathBuf,
    /// Binary index artifact; the metadata sidecar sits next to it
    pub store_path: PathBuf,
    /// Chunk window in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
    /// Extension (without the dot) of files treated as documents
    pub extension: String,
    /// Number of results returned when the caller does not ask for a specific count
    pub default_k: usize,
    /// Rebuild from the documents instead of failing when the store cannot be loaded
    pub rebuild_on_corrupt_store: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pdf_dir: PathBuf::from("data/College_PDFs"),
            store_path: PathBuf::from("index_data.idx"),
            chunk_size: docseek_context::DEFAULT_CHUNK_SIZE,
            overlap: docseek_context::DEFAULT_OVERLAP,
            extension: "pdf".to_string(),
            default_k: 3,
            rebuild_on_corrupt_store: true,
        }
    }
}

impl EngineConfig {
    /// Create a configuration for the given document directory and store path.
    ///
    /// # Arguments
    /// * `pdf_dir` - Directory holding the documents to index
    /// * `store_path` - Path of the binary index artifact
    pub fn new(pdf_dir: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            pdf_dir: pdf_dir.into(),
            store_path: store_path.into(),
            ..Self::default()
        }
    }

    pub fn with_pdf_dir(mut self, pdf_dir: impl Into<PathBuf>) -> Self {
        self.pdf_dir = pdf_dir.into();
        self
    }

    pub fn with_store_path(mut self, store_path: impl Into<PathBuf>) -> Self {
        self.store_path = store_path.into();
        self
    }

    /// Set the chunk window. Validated when the engine is opened.
    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap = overlap;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_default_k(mut self, default_k: usize) -> Self {
        self.default_k = default_k;
        self
    }

    pub fn with_rebuild_on_corrupt_store(mut self, rebuild: bool) -> Self {
        self.rebuild_on_corrupt_store = rebuild;
        self
    }

    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig::new(self.chunk_size, self.overlap).with_extension(self.extension.clone())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.extension.trim().is_empty() || self.extension.contains('.') {
            return Err(EngineError::config(format!(
                "extension must be a bare file extension like \"pdf\", got {:?}",
                self.extension
            )));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(EngineError::config("store_path must not be empty"));
        }
        ChunkingStrategy::new(self.chunking_config())
            .map(|_| ())
            .map_err(|e| EngineError::config(e.to_string()))
    }
}

/// Lifecycle state of a document engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Loading,
    Building,
    Loaded,
    Ready,
    Failed(String),
}

impl EngineState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Loading => write!(f, "loading"),
            Self::Building => write!(f, "building"),
            Self::Loaded => write!(f, "loaded"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A document that could not be ingested, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDocument {
    pub source: String,
    pub reason: String,
}

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Documents that contributed chunks, in ingestion order
    pub documents_added: Vec<String>,
    pub chunks_added: usize,
    /// Documents with no extractable text
    pub skipped: Vec<String>,
    pub failed: Vec<FailedDocument>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestReport {
    fn started() -> Self {
        let now = Utc::now();
        Self {
            documents_added: Vec::new(),
            chunks_added: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// True when the pass added nothing to the index.
    pub fn is_empty(&self) -> bool {
        self.documents_added.is_empty()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Cumulative counters since the engine was opened
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub ingest_passes: usize,
    pub documents_ingested: usize,
    pub chunks_created: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub last_ingest: Option<DateTime<Utc>>,
}

/// Point-in-time view of an engine, for CLIs and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub state: EngineState,
    pub documents: usize,
    pub chunks: usize,
    pub dimension: Option<usize>,
    pub embedder: String,
    pub extractor: String,
    pub pdf_dir: PathBuf,
    pub store_path: PathBuf,
    pub processed_documents: Vec<String>,
    pub ingest_passes: usize,
    pub documents_ingested: usize,
    pub chunks_created: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub last_ingest: Option<DateTime<Utc>>,
}

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    /// File name of the document the chunk came from
    pub source: String,
    /// Squared Euclidean distance to the query
    pub distance: f32,
    /// Position of the chunk in the full corpus
    pub position: usize,
}

/// Result of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchResponse {
    /// Best match first; at most `k` entries, possibly none.
    Hits(Vec<SearchHit>),
    /// A subject filter was given and no document name contains it.
    NoSubjectMatch { subject: String },
}

impl SearchResponse {
    /// The hits, or an empty slice for [`SearchResponse::NoSubjectMatch`].
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Self::Hits(hits) => hits,
            Self::NoSubjectMatch { .. } => &[],
        }
    }

    pub fn is_no_subject_match(&self) -> bool {
        matches!(self, Self::NoSubjectMatch { .. })
    }
}

// Extracted, chunked and embedded, but not yet committed.
struct StagedDocument {
    source: String,
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

/// The retrieval engine: owns the corpus and serves queries against it.
pub struct DocumentEngine {
    config: EngineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn TextExtractor>,
    chunking_strategy: ChunkingStrategy,
    store: FileStore,
    corpus: RwLock<PersistedState>,
    /// Serializes ingestion passes. Holds true while the corpus has changes
    /// the store has not accepted yet.
    ingest_lock: Mutex<bool>,
    state: Arc<watch::Sender<EngineState>>,
    stats: RwLock<ProcessingStats>,
}

impl fmt::Debug for DocumentEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentEngine")
            .field("config", &self.config)
            .field("embedder", &self.embedder.provider_name())
            .field("extractor", &self.extractor.name())
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl DocumentEngine {
    /// Open an engine: load or build the index and ingest any new documents.
    ///
    /// Returns once the engine is `Ready`. This can take a long time on a first
    /// build; use [`crate::service::EngineHandle`] to run it in the background.
    ///
    /// # Arguments
    /// * `config` - Document directory, store location and chunking parameters
    /// * `embedder` - Provider used for both chunks and queries
    /// * `extractor` - Turns one document file into text
    ///
    /// # Errors
    /// - Invalid configuration
    /// - A store that cannot be loaded while `rebuild_on_corrupt_store` is off
    /// - Every document failing to embed
    /// - Failure to persist the result
    pub async fn open(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Self> {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self::open_with_state(config, embedder, extractor, Arc::new(state)).await
    }

    /// Like [`open`](Self::open), publishing every state transition on `state`.
    pub async fn open_with_state(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
        state: Arc<watch::Sender<EngineState>>,
    ) -> Result<Self> {
        if let Err(e) = config.validate() {
            state.send_replace(EngineState::Failed(e.to_string()));
            return Err(e);
        }
        let chunking_strategy = ChunkingStrategy::new(config.chunking_config())
            .map_err(|e| EngineError::config(e.to_string()))?;

        info!(
            "Opening document engine for {} (store {}, embedder {}, extractor {})",
            config.pdf_dir.display(),
            config.store_path.display(),
            embedder.provider_name(),
            extractor.name()
        );

        let engine = Self {
            store: FileStore::new(config.store_path.clone()),
            config,
            embedder,
            extractor,
            chunking_strategy,
            corpus: RwLock::new(PersistedState::default()),
            ingest_lock: Mutex::new(false),
            state,
            stats: RwLock::new(ProcessingStats::default()),
        };

        match engine.initialize().await {
            Ok(()) => Ok(engine),
            Err(e) => {
                error!("Document engine failed to start: {}", e);
                engine.set_state(EngineState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn initialize(&self) -> Result<()> {
        if self.store.exists() {
            self.set_state(EngineState::Loading);
            match self.load_store().await {
                Ok(persisted) => {
                    info!(
                        "Loaded {} chunks from {} documents",
                        persisted.chunks.len(),
                        persisted.processed.len()
                    );
                    *self.corpus.write().await = persisted;
                    self.set_state(EngineState::Loaded);
                    self.ingest(false).await?;
                }
                Err(e) if self.config.rebuild_on_corrupt_store => {
                    error!(
                        "Persisted store {} is unusable ({}); rebuilding from {}",
                        self.store.describe(),
                        e,
                        self.config.pdf_dir.display()
                    );
                    self.build().await?;
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            info!(
                "No persisted store at {}; building from scratch",
                self.store.describe()
            );
            self.build().await?;
        }

        self.set_state(EngineState::Ready);
        Ok(())
    }

    async fn build(&self) -> Result<()> {
        self.set_state(EngineState::Building);
        *self.corpus.write().await = PersistedState::default();
        self.ingest(true).await?;
        Ok(())
    }

    async fn load_store(&self) -> std::result::Result<PersistedState, PersistenceError> {
        let persisted = self.store.load().await?;
        let expected = self.embedder.embedding_dimension();
        match persisted.index.dimension() {
            Some(stored) if !persisted.index.is_empty() && stored != expected => {
                Err(PersistenceError::IncompatibleDimension { stored, expected })
            }
            _ => Ok(persisted),
        }
    }

    fn set_state(&self, next: EngineState) {
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            info!("Document engine state: {} -> {}", previous, next);
        }
    }

    /// Scan the document directory and ingest every document not yet processed.
    ///
    /// Documents already in the processed-set are never re-read, so running this
    /// twice with no new files in between changes nothing. Documents without
    /// text are skipped (and retried next time); documents that fail extraction
    /// or embedding are reported and skipped.
    ///
    /// # Errors
    /// - The document directory exists but cannot be read
    /// - Every document that reached the embedder failed to embed
    /// - The updated corpus could not be persisted. The changes stay in memory
    ///   and the next pass retries the save.
    pub async fn ingest_new_documents(&self) -> Result<IngestReport> {
        self.ingest(false).await
    }

    async fn ingest(&self, always_persist: bool) -> Result<IngestReport> {
        let mut unsaved = self.ingest_lock.lock().await;
        let mut report = IngestReport::started();

        let candidates = self.list_documents().await?;
        let pending: Vec<(String, PathBuf)> = {
            let corpus = self.corpus.read().await;
            candidates
                .into_iter()
                .filter(|(name, _)| !corpus.processed.contains(name))
                .collect()
        };

        if pending.is_empty() {
            debug!("No new documents in {}", self.config.pdf_dir.display());
        } else {
            info!(
                "Found {} new documents in {}",
                pending.len(),
                self.config.pdf_dir.display()
            );
        }

        let mut staged = Vec::new();
        let mut embed_attempts = 0usize;
        let mut last_embed_error: Option<EmbedError> = None;

        for (source, path) in pending {
            let text = match self.extractor.extract(&path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to extract {}: {}", source, e);
                    report.failed.push(FailedDocument {
                        source,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let chunks: Vec<String> = self
                .chunking_strategy
                .chunk_content(&source, &text)
                .into_iter()
                .map(|chunk| chunk.chunk_text)
                .collect();
            if chunks.is_empty() {
                warn!("No text found in {}. Skipping.", source);
                report.skipped.push(source);
                continue;
            }

            embed_attempts += 1;
            match self.embed_document(&chunks).await {
                Ok(vectors) => {
                    debug!("Embedded {} chunks of {}", chunks.len(), source);
                    staged.push(StagedDocument {
                        source,
                        chunks,
                        vectors,
                    });
                }
                Err(e) => {
                    error!("Failed to embed {}: {}", source, e);
                    report.failed.push(FailedDocument {
                        source,
                        reason: e.to_string(),
                    });
                    last_embed_error = Some(e);
                }
            }
        }

        if embed_attempts > 0 && staged.is_empty() {
            if let Some(e) = last_embed_error {
                self.record(&report).await;
                return Err(EngineError::Embedding(e));
            }
        }

        self.commit(staged, &mut report).await;

        if !report.is_empty() {
            *unsaved = true;
        } else if *unsaved {
            info!(
                "Retrying save of changes not yet in {}",
                self.store.describe()
            );
        }
        if *unsaved || always_persist {
            self.store.save(&*self.corpus.read().await).await?;
            *unsaved = false;
        }

        report.finished_at = Utc::now();
        self.record(&report).await;

        if report.is_empty() {
            debug!(
                "Ingestion pass finished in {}ms with nothing new",
                report.elapsed_ms()
            );
        } else {
            info!(
                "Ingested {} documents ({} chunks) in {}ms; {} skipped, {} failed",
                report.documents_added.len(),
                report.chunks_added,
                report.elapsed_ms(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    async fn embed_document(
        &self,
        chunks: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        let result = self.embedder.embed_texts(chunks).await?;
        if result.len() != chunks.len() {
            return Err(EmbedError::embedding_gen(format!(
                "embedder returned {} vectors for {} chunks",
                result.len(),
                chunks.len()
            )));
        }
        Ok(result.embeddings)
    }

    // Appends every staged document under one write lock, so vectors, chunks,
    // sources and the processed-set change together.
    async fn commit(&self, staged: Vec<StagedDocument>, report: &mut IngestReport) {
        if staged.is_empty() {
            return;
        }
        let mut corpus = self.corpus.write().await;
        for document in staged {
            if let Err(e) = corpus.index.add(&document.vectors) {
                error!("Rejected embeddings for {}: {}", document.source, e);
                report.failed.push(FailedDocument {
                    source: document.source,
                    reason: e.to_string(),
                });
                continue;
            }
            let count = document.chunks.len();
            corpus
                .sources
                .extend(std::iter::repeat_n(document.source.clone(), count));
            corpus.chunks.extend(document.chunks);
            corpus.processed.insert(document.source.clone());

            report.chunks_added += count;
            report.documents_added.push(document.source);
        }
    }

    async fn record(&self, report: &IngestReport) {
        let mut stats = self.stats.write().await;
        stats.ingest_passes += 1;
        stats.documents_ingested += report.documents_added.len();
        stats.chunks_created += report.chunks_added;
        stats.documents_skipped += report.skipped.len();
        stats.documents_failed += report.failed.len();
        stats.last_ingest = Some(report.finished_at);
    }

    /// Documents in the directory with the configured extension, sorted by name.
    async fn list_documents(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir = &self.config.pdf_dir;
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Document directory {} does not exist; treating it as empty",
                    dir.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if !self.chunking_strategy.should_index_file(&path) {
                continue;
            }
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("Failed to get metadata for {}: {}", path.display(), e);
                    continue;
                }
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            documents.push((name, path));
        }
        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }

    /// Find the `k` chunks closest to `query`, optionally limited to documents
    /// whose file name contains `subject` (case-insensitive).
    ///
    /// A blank subject means no filter. When a subject matches no document the
    /// result is [`SearchResponse::NoSubjectMatch`] rather than an empty list.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(engine: &docseek_retriever::DocumentEngine) -> docseek_retriever::Result<()> {
    /// let response = engine.search("integration by parts", 3, Some("calc")).await?;
    /// for hit in response.hits() {
    ///     println!("[{}] {}", hit.source, hit.text);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// [`EngineError::Query`] when the query cannot be embedded or its vector
    /// does not fit the index.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        subject: Option<&str>,
    ) -> Result<SearchResponse> {
        let subject = subject.map(str::trim).filter(|s| !s.is_empty());
        if k == 0 {
            return Ok(SearchResponse::Hits(Vec::new()));
        }

        let query_vector = self
            .embedder
            .embed_text(query)
            .await
            .map_err(|e| EngineError::query(format!("failed to embed query: {e}")))?;

        let corpus = self.corpus.read().await;
        let (neighbors, positions) = match subject {
            None => {
                let neighbors = corpus
                    .index
                    .search(&query_vector, k)
                    .map_err(|e| EngineError::query(e.to_string()))?;
                (neighbors, None)
            }
            Some(subject) => {
                let needle = subject.to_lowercase();
                let positions: Vec<usize> = corpus
                    .sources
                    .iter()
                    .enumerate()
                    .filter(|(_, source)| source.to_lowercase().contains(&needle))
                    .map(|(position, _)| position)
                    .collect();
                if positions.is_empty() {
                    debug!("No documents match subject {:?}", subject);
                    return Ok(SearchResponse::NoSubjectMatch {
                        subject: subject.to_string(),
                    });
                }

                let subset = corpus.index.subset(&positions)?;
                let neighbors = subset
                    .search(&query_vector, k)
                    .map_err(|e| EngineError::query(e.to_string()))?;
                (neighbors, Some(positions))
            }
        };

        let hits = neighbors
            .into_iter()
            .map(|neighbor| {
                let position = match &positions {
                    Some(positions) => positions[neighbor.position],
                    None => neighbor.position,
                };
                SearchHit {
                    text: corpus.chunks[position].clone(),
                    source: corpus.sources[position].clone(),
                    distance: neighbor.distance,
                    position,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Query {:?} (subject {:?}) returned {} hits",
            query,
            subject,
            hits.len()
        );
        Ok(SearchResponse::Hits(hits))
    }

    /// [`search`](Self::search) with the configured `default_k`.
    pub async fn search_default(
        &self,
        query: &str,
        subject: Option<&str>,
    ) -> Result<SearchResponse> {
        self.search(query, self.config.default_k, subject).await
    }

    /// Names of every ingested document, sorted.
    pub async fn processed_documents(&self) -> Vec<String> {
        self.corpus.read().await.processed.iter().cloned().collect()
    }

    pub async fn stats(&self) -> EngineStats {
        let corpus = self.corpus.read().await;
        let stats = self.stats.read().await.clone();
        EngineStats {
            state: self.state(),
            documents: corpus.processed.len(),
            chunks: corpus.chunks.len(),
            dimension: corpus.index.dimension(),
            embedder: self.embedder.provider_name().to_string(),
            extractor: self.extractor.name().to_string(),
            pdf_dir: self.config.pdf_dir.clone(),
            store_path: self.config.store_path.clone(),
            processed_documents: corpus.processed.iter().cloned().collect(),
            ingest_passes: stats.ingest_passes,
            documents_ingested: stats.documents_ingested,
            chunks_created: stats.chunks_created,
            documents_skipped: stats.documents_skipped,
            documents_failed: stats.documents_failed,
            last_ingest: stats.last_ingest,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    /// Receive every subsequent state transition.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.config.pdf_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::retrieval::extractor::tests::write_pdf;
    use crate::retrieval::extractor::{PdfTextExtractor, PlainTextExtractor};
    use anyhow::Result;
    use async_trait::async_trait;
    use docseek_embed::{EmbeddingResult, HashingProvider};
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    const CALC: &str = "Derivatives and integrals. Integration by parts and integration \
                        by substitution are the main techniques of integral calculus.";
    const BIO: &str = "Cell mitosis splits the nucleus into two identical sets of chromosomes.";

    fn test_config(dir: &TempDir) -> EngineConfig {
        EngineConfig::new(dir.path().join("docs"), dir.path().join("store/index_data.idx"))
    }

    async fn write_doc(dir: &TempDir, name: &str, text: &str) -> Result<()> {
        let docs = dir.path().join("docs");
        tokio::fs::create_dir_all(&docs).await?;
        tokio::fs::write(docs.join(name), text).await?;
        Ok(())
    }

    async fn open_text_engine(config: EngineConfig) -> Result<DocumentEngine> {
        Ok(DocumentEngine::open(
            config,
            Arc::new(HashingProvider::new(256)?),
            Arc::new(PlainTextExtractor::new()),
        )
        .await?)
    }

    /// Fails every batch embedding; queries still work.
    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed_text(&self, _text: &str) -> docseek_embed::Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }

        async fn embed_texts(&self, _texts: &[String]) -> docseek_embed::Result<EmbeddingResult> {
            Err(EmbedError::embedding_gen("model backend unavailable"))
        }

        fn embedding_dimension(&self) -> usize {
            4
        }

        fn provider_name(&self) -> &str {
            "broken"
        }
    }

    /// Embeds chunks correctly but returns queries of the wrong width.
    struct NarrowQueryEmbedder(HashingProvider);

    #[async_trait]
    impl EmbeddingProvider for NarrowQueryEmbedder {
        async fn embed_text(&self, _text: &str) -> docseek_embed::Result<Vec<f32>> {
            Ok(vec![0.5; 8])
        }

        async fn embed_texts(&self, texts: &[String]) -> docseek_embed::Result<EmbeddingResult> {
            self.0.embed_texts(texts).await
        }

        fn embedding_dimension(&self) -> usize {
            self.0.embedding_dimension()
        }

        fn provider_name(&self) -> &str {
            "narrow"
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::default().with_chunking(200, 200).validate().is_err());
        assert!(EngineConfig::default().with_extension("").validate().is_err());
        assert!(EngineConfig::default().with_extension(".pdf").validate().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(EngineState::Ready.to_string(), "ready");
        assert_eq!(
            EngineState::Failed("disk full".to_string()).to_string(),
            "failed: disk full"
        );
    }

    #[tokio::test]
    async fn test_query_ranks_matching_document_first() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        write_doc(&dir, "bio.pdf", BIO).await?;

        let engine = open_text_engine(test_config(&dir)).await?;
        assert_eq!(engine.state(), EngineState::Ready);

        let response = engine.search("integration", 3, None).await?;
        let hits = response.hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "calc.pdf");
        assert_eq!(hits[1].source, "bio.pdf");
        assert!(hits[0].distance <= hits[1].distance);
        Ok(())
    }

    #[tokio::test]
    async fn test_subject_filter_restricts_sources() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        write_doc(&dir, "bio.pdf", BIO).await?;
        write_doc(&dir, "Math_101.pdf", "Linear algebra: vectors and matrices.").await?;

        let engine = open_text_engine(test_config(&dir).with_chunking(40, 10)).await?;

        let response = engine.search("integration", 10, Some("bio")).await?;
        assert!(!response.hits().is_empty());
        assert!(response.hits().iter().all(|h| h.source == "bio.pdf"));

        let response = engine.search("matrices", 10, Some("MATH")).await?;
        assert!(!response.hits().is_empty());
        assert!(
            response
                .hits()
                .iter()
                .all(|h| h.source.to_lowercase().contains("math"))
        );

        let response = engine.search("integration", 3, Some("chemistry")).await?;
        assert_eq!(
            response,
            SearchResponse::NoSubjectMatch {
                subject: "chemistry".to_string()
            }
        );

        // A blank subject is no filter at all.
        let response = engine.search("integration", 3, Some("   ")).await?;
        assert_eq!(response.hits().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_filtered_positions_map_to_full_corpus() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "a_notes.pdf", "alpha beta gamma").await?;
        write_doc(&dir, "b_notes.pdf", "delta epsilon zeta").await?;

        let engine = open_text_engine(test_config(&dir)).await?;
        let response = engine.search("delta epsilon zeta", 1, Some("b_")).await?;
        let hit = &response.hits()[0];
        assert_eq!(hit.source, "b_notes.pdf");
        assert_eq!(hit.text, "delta epsilon zeta");
        assert_eq!(hit.position, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_k_limits_results() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        write_doc(&dir, "bio.pdf", BIO).await?;

        let engine = open_text_engine(test_config(&dir).with_chunking(30, 5)).await?;
        let total = engine.stats().await.chunks;
        assert!(total > 4);

        assert_eq!(engine.search("integration", 2, None).await?.hits().len(), 2);
        assert!(engine.search("integration", 0, None).await?.hits().is_empty());
        assert_eq!(
            engine.search("integration", total + 10, None).await?.hits().len(),
            total
        );
        assert_eq!(
            engine.search_default("integration", None).await?.hits().len(),
            3
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_directory_gives_ready_empty_engine() -> Result<()> {
        let dir = tempdir()?;
        let engine = open_text_engine(test_config(&dir)).await?;

        assert_eq!(engine.state(), EngineState::Ready);
        assert!(engine.search("anything", 3, None).await?.hits().is_empty());
        // The initial build persists even when empty.
        assert!(engine.store().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_restart_ingests_only_new_documents() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "a.pdf", CALC).await?;

        let a_chunks = {
            let engine = open_text_engine(test_config(&dir).with_chunking(50, 10)).await?;
            assert_eq!(engine.processed_documents().await, vec!["a.pdf"]);
            engine.stats().await.chunks
        };

        write_doc(&dir, "b.pdf", BIO).await?;
        let engine = open_text_engine(test_config(&dir).with_chunking(50, 10)).await?;

        assert_eq!(engine.processed_documents().await, vec!["a.pdf", "b.pdf"]);
        let stats = engine.stats().await;
        assert_eq!(stats.documents_ingested, 1, "only b.pdf is new");
        assert!(stats.chunks > a_chunks);

        let response = engine.search("integration", stats.chunks, None).await?;
        let from_a = response.hits().iter().filter(|h| h.source == "a.pdf").count();
        assert_eq!(from_a, a_chunks, "a.pdf must not be duplicated");
        Ok(())
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let engine = open_text_engine(test_config(&dir)).await?;
        let before = engine.stats().await;

        let first = engine.ingest_new_documents().await?;
        let second = engine.ingest_new_documents().await?;
        assert!(first.is_empty());
        assert!(second.is_empty());

        let after = engine.stats().await;
        assert_eq!(after.chunks, before.chunks);
        assert_eq!(after.processed_documents, before.processed_documents);
        Ok(())
    }

    #[tokio::test]
    async fn test_new_document_ingested_while_running() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let engine = open_text_engine(test_config(&dir)).await?;

        write_doc(&dir, "bio.pdf", BIO).await?;
        write_doc(&dir, "ignored.txt", BIO).await?;
        let report = engine.ingest_new_documents().await?;
        assert_eq!(report.documents_added, vec!["bio.pdf"]);
        assert_eq!(report.chunks_added, 1);
        assert!(report.finished_at >= report.started_at);

        // The addition was persisted.
        let persisted = engine.store().load().await?;
        assert!(persisted.processed.contains("bio.pdf"));
        assert_eq!(persisted.chunks.len(), 2);
        Ok(())
    }

    /// Replace the store directory with a plain file so every save fails.
    async fn block_store_dir(dir: &TempDir) -> Result<()> {
        let store_dir = dir.path().join("store");
        tokio::fs::remove_dir_all(&store_dir).await?;
        tokio::fs::write(&store_dir, b"not a directory").await?;
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_failed_save_is_retried_on_next_pass() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let engine = open_text_engine(test_config(&dir)).await?;

        block_store_dir(&dir).await?;
        write_doc(&dir, "bio.pdf", BIO).await?;
        let result = engine.ingest_new_documents().await;
        assert!(matches!(result, Err(EngineError::Persistence(_))));
        // Committed in memory even though the store rejected it.
        assert_eq!(engine.processed_documents().await, vec!["bio.pdf", "calc.pdf"]);

        tokio::fs::remove_file(dir.path().join("store")).await?;
        let report = engine.ingest_new_documents().await?;
        assert!(report.is_empty());
        assert!(logs_contain("Retrying save of changes not yet in"));

        let persisted = engine.store().load().await?;
        assert_eq!(persisted.processed.len(), 2);
        assert!(persisted.processed.contains("bio.pdf"));
        assert_eq!(persisted.chunks.len(), 2);

        // Saved once; the following pass has nothing to write.
        block_store_dir(&dir).await?;
        engine.ingest_new_documents().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_pass_with_nothing_new_does_not_write_store() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let engine = open_text_engine(test_config(&dir)).await?;

        block_store_dir(&dir).await?;
        let report = engine.ingest_new_documents().await?;
        assert!(report.is_empty());
        assert_eq!(engine.stats().await.chunks, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_document_is_extracted_again_each_pass() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        write_doc(&dir, "scan.pdf", "\n\n").await?;
        let engine = open_text_engine(test_config(&dir)).await?;

        block_store_dir(&dir).await?;
        for _ in 0..2 {
            let report = engine.ingest_new_documents().await?;
            assert_eq!(report.skipped, vec!["scan.pdf"]);
            assert!(report.is_empty());
        }
        assert_eq!(engine.stats().await.documents_skipped, 3);
        assert_eq!(engine.processed_documents().await, vec!["calc.pdf"]);
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_empty_document_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        write_doc(&dir, "empty.pdf", "  \n ").await?;

        let engine = open_text_engine(test_config(&dir)).await?;

        assert!(logs_contain("No text found in empty.pdf. Skipping."));
        assert_eq!(engine.processed_documents().await, vec!["calc.pdf"]);
        assert_eq!(engine.stats().await.documents_skipped, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_document_does_not_abort_batch() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let docs = dir.path().join("docs");
        tokio::fs::write(docs.join("binary.pdf"), [0xffu8, 0xfe, 0x00]).await?;

        let engine = open_text_engine(test_config(&dir)).await?;
        let stats = engine.stats().await;
        assert_eq!(stats.processed_documents, vec!["calc.pdf"]);
        assert_eq!(stats.documents_failed, 1);
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_corrupt_store_triggers_rebuild() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let config = test_config(&dir);
        let chunks = open_text_engine(config.clone()).await?.stats().await.chunks;

        tokio::fs::write(&config.store_path, b"DSKFLAT1 garbage").await?;

        let engine = open_text_engine(config).await?;
        assert!(logs_contain("is unusable"));
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.stats().await.chunks, chunks);
        assert!(engine.store().load().await.is_ok(), "rebuild was persisted");
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_store_without_rebuild_fails() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let config = test_config(&dir).with_rebuild_on_corrupt_store(false);
        open_text_engine(config.clone()).await?;

        tokio::fs::write(&config.store_path, b"not an index").await?;

        let err = open_text_engine(config).await.unwrap_err();
        let err = err.downcast::<EngineError>()?;
        assert!(matches!(err, EngineError::Persistence(_)), "got {err}");
        Ok(())
    }

    #[tokio::test]
    async fn test_store_from_other_embedder_is_rebuilt() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let config = test_config(&dir);
        open_text_engine(config.clone()).await?;

        let engine = DocumentEngine::open(
            config,
            Arc::new(HashingProvider::new(64)?),
            Arc::new(PlainTextExtractor::new()),
        )
        .await?;
        assert_eq!(engine.stats().await.dimension, Some(64));
        Ok(())
    }

    #[tokio::test]
    async fn test_all_embeddings_failing_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;

        let (state, mut rx) = watch::channel(EngineState::Uninitialized);
        let result = DocumentEngine::open_with_state(
            test_config(&dir),
            Arc::new(BrokenEmbedder),
            Arc::new(PlainTextExtractor::new()),
            Arc::new(state),
        )
        .await;

        assert!(matches!(result, Err(EngineError::Embedding(_))));
        assert!(rx.borrow_and_update().is_failed());
        Ok(())
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_query_error() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;

        let engine = DocumentEngine::open(
            test_config(&dir),
            Arc::new(NarrowQueryEmbedder(HashingProvider::new(32)?)),
            Arc::new(PlainTextExtractor::new()),
        )
        .await?;

        let err = engine.search("integration", 3, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Query { .. }), "got {err}");
        Ok(())
    }

    #[tokio::test]
    async fn test_state_transitions_are_published() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;

        let (state, rx) = watch::channel(EngineState::Uninitialized);
        let engine = DocumentEngine::open_with_state(
            test_config(&dir),
            Arc::new(HashingProvider::new(64)?),
            Arc::new(PlainTextExtractor::new()),
            Arc::new(state),
        )
        .await?;

        assert_eq!(*rx.borrow(), EngineState::Ready);
        assert_eq!(*engine.subscribe().borrow(), EngineState::Ready);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_queries_during_ingestion() -> Result<()> {
        let dir = tempdir()?;
        write_doc(&dir, "calc.pdf", CALC).await?;
        let engine = Arc::new(open_text_engine(test_config(&dir)).await?);
        write_doc(&dir, "bio.pdf", BIO).await?;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(async move {
                engine.search("integration", 3, None).await
            }));
        }
        let ingest = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.ingest_new_documents().await })
        };

        for task in tasks {
            let response = task.await??;
            assert!(!response.hits().is_empty());
            assert_eq!(response.hits()[0].source, "calc.pdf");
        }
        assert_eq!(ingest.await??.documents_added, vec!["bio.pdf"]);
        assert_eq!(engine.stats().await.chunks, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_real_pdf_ingestion() -> Result<()> {
        let dir = tempdir()?;
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs)?;
        write_pdf(&docs.join("calc.pdf"), &["Derivatives and integrals", "Integration by parts"])?;
        write_pdf(&docs.join("bio.pdf"), &["Cell mitosis splits the nucleus"])?;

        let engine = DocumentEngine::open(
            test_config(&dir),
            Arc::new(HashingProvider::new(256)?),
            Arc::new(PdfTextExtractor::new()),
        )
        .await?;

        assert_eq!(engine.processed_documents().await, vec!["bio.pdf", "calc.pdf"]);
        let response = engine.search("integration", 1, None).await?;
        assert_eq!(response.hits()[0].source, "calc.pdf");
        assert!(response.hits()[0].text.contains("Integration"));
        Ok(())
    }
}
