//! Watches the document directory and triggers ingestion when documents appear.
//!
//! Filesystem events are debounced, filtered to the configured extension and
//! funnelled through a channel to a single listener task. The listener drains
//! whatever has queued up and issues one ingestion call per burst; the engine
//! itself decides which of the files are actually new.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use super::engine::DocumentEngine;

/// Something that can ingest documents after the watcher sees changes.
#[async_trait]
pub trait IngestTrigger: Send + Sync {
    async fn documents_changed(&self, paths: Vec<PathBuf>) -> Result<()>;
}

#[async_trait]
impl IngestTrigger for DocumentEngine {
    async fn documents_changed(&self, paths: Vec<PathBuf>) -> Result<()> {
        debug!("{} document paths changed", paths.len());
        let report = self.ingest_new_documents().await?;
        for document in &report.documents_added {
            info!("Indexed new document {}", document);
        }
        Ok(())
    }
}

/// Keeps a debounced watch on one directory alive; dropping it stops watching.
pub struct DirectoryWatcher {
    base: PathBuf,
    _event_watcher: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    listener: tokio::task::JoinHandle<Result<()>>,
}

impl DirectoryWatcher {
    /// Start watching `base` (non-recursively) for files ending in `.extension`.
    ///
    /// # Arguments
    /// * `base` - Directory to watch; it must exist
    /// * `extension` - Document extension without the dot, compared case-insensitively
    /// * `debounce` - Quiet period before a burst of events is delivered
    /// * `trigger` - Receives each batch of changed document paths
    pub fn open<T: IngestTrigger + ?Sized + 'static>(
        base: &Path,
        extension: &str,
        debounce: Duration,
        trigger: Arc<T>,
    ) -> Result<Self> {
        let base = base.to_path_buf();
        let (events_tx, events_rx) = mpsc::channel(128);

        // The listener needs to exist before events arrive
        let listener = tokio::spawn(Self::listen(events_rx, trigger));

        let extension = extension.to_ascii_lowercase();
        let mut event_watcher = notify_debouncer_mini::new_debouncer(
            debounce,
            move |res: notify_debouncer_mini::DebounceEventResult| match res {
                Ok(events) => {
                    for event in events {
                        if !has_extension(&event.path, &extension) {
                            continue;
                        }
                        // Runs on the debouncer's own thread, not in async context.
                        if events_tx.blocking_send(event.path).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => error!("Directory watch error: {}", e),
            },
        )?;

        event_watcher
            .watcher()
            .watch(&base, notify::RecursiveMode::NonRecursive)?;
        info!("Watching {} for new documents", base.display());

        Ok(Self {
            base,
            _event_watcher: event_watcher,
            listener,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Stop watching and wait for the listener to finish its current batch.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            base,
            _event_watcher,
            listener,
        } = self;
        // Dropping the debouncer drops the only sender, which ends the listener.
        drop(_event_watcher);
        listener.await??;
        info!("Stopped watching {}", base.display());
        Ok(())
    }

    /// Deliver changed paths to `trigger`, one call per burst of queued events.
    async fn listen<T: IngestTrigger + ?Sized>(
        events_rx: mpsc::Receiver<PathBuf>,
        trigger: Arc<T>,
    ) -> Result<()> {
        let mut batches = ReceiverStream::new(events_rx).ready_chunks(64);
        while let Some(mut paths) = batches.next().await {
            paths.sort();
            paths.dedup();
            if let Err(e) = trigger.documents_changed(paths).await {
                error!("Failed to ingest changed documents: {}", e);
            }
        }
        Ok(())
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
