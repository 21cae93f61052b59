//! Explicit ownership of a shared [`DocumentEngine`].
//!
//! An [`EngineHandle`] is created once at startup and cloned into whatever
//! needs query access. It builds the engine at most once, either eagerly in the
//! background ([`EngineHandle::start`]) or lazily on the first query. Until the
//! engine is ready, [`EngineHandle::engine`] answers with
//! [`EngineError::NotReady`] instead of blocking, so request paths never wait
//! on an index build. A failed construction leaves the handle empty and the
//! next request tries again.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OnceCell, watch};
use tracing::{error, info};

use docseek_embed::{EmbeddingProvider, create_provider};

use crate::config::RetrieverConfig;
use crate::error::{EngineError, Result};
use crate::retrieval::engine::{DocumentEngine, EngineConfig, EngineState};
use crate::retrieval::extractor::{TextExtractor, extractor_for_extension};

/// Builds an engine, reporting progress on the given state channel.
pub type EngineFactory = Arc<
    dyn Fn(Arc<watch::Sender<EngineState>>) -> BoxFuture<'static, Result<DocumentEngine>>
        + Send
        + Sync,
>;

struct Inner {
    factory: EngineFactory,
    engine: OnceCell<Arc<DocumentEngine>>,
    state: Arc<watch::Sender<EngineState>>,
    in_flight: AtomicBool,
}

/// Cloneable handle to a lazily or eagerly constructed engine.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    pub fn with_factory(factory: EngineFactory) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                factory,
                engine: OnceCell::new(),
                state: Arc::new(state),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Handle over an already-constructed embedder and extractor.
    pub fn from_parts(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self::with_factory(Arc::new(move |state: Arc<watch::Sender<EngineState>>| {
            let config = config.clone();
            let embedder = Arc::clone(&embedder);
            let extractor = Arc::clone(&extractor);
            async move { DocumentEngine::open_with_state(config, embedder, extractor, state).await }
                .boxed()
        }))
    }

    /// Handle that also creates the embedder (which may download a model) and
    /// picks the extractor for the configured extension.
    pub fn from_config(config: RetrieverConfig) -> Self {
        Self::with_factory(Arc::new(move |state: Arc<watch::Sender<EngineState>>| {
            let config = config.clone();
            async move {
                config.validate()?;
                let extractor = extractor_for_extension(&config.engine.extension).ok_or_else(
                    || {
                        EngineError::config(format!(
                            "no text extractor for extension {:?}",
                            config.engine.extension
                        ))
                    },
                )?;
                let embedder = create_provider(&config.embedding).await?;
                DocumentEngine::open_with_state(config.engine, embedder, extractor, state).await
            }
            .boxed()
        }))
    }

    /// Begin construction on a background task. Does nothing if the engine is
    /// built or a construction is already running.
    ///
    /// Returns whether a new construction was started.
    pub fn start(&self) -> bool {
        if self.inner.engine.initialized() {
            return false;
        }
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let handle = self.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.construct().await {
                error!("Background engine construction failed: {}", e);
            }
            handle.inner.in_flight.store(false, Ordering::Release);
        });
        true
    }

    /// The engine if it is ready; otherwise trigger construction and report
    /// [`EngineError::NotReady`] with the current state.
    pub fn engine(&self) -> Result<Arc<DocumentEngine>> {
        if let Some(engine) = self.inner.engine.get() {
            return Ok(Arc::clone(engine));
        }
        self.start();
        Err(EngineError::NotReady {
            state: self.state(),
        })
    }

    /// Wait for the engine, constructing it on this task if nobody else is.
    pub async fn wait_ready(&self) -> Result<Arc<DocumentEngine>> {
        self.construct().await
    }

    pub fn is_ready(&self) -> bool {
        self.inner.engine.initialized()
    }

    pub fn state(&self) -> EngineState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    async fn construct(&self) -> Result<Arc<DocumentEngine>> {
        let inner = &self.inner;
        let engine = inner
            .engine
            .get_or_try_init(|| async {
                info!("Constructing document engine");
                match (inner.factory)(Arc::clone(&inner.state)).await {
                    Ok(engine) => Ok(Arc::new(engine)),
                    Err(e) => {
                        inner.state.send_replace(EngineState::Failed(e.to_string()));
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}
