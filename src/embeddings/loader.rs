//! Lazy, shared pipeline loading.
//!
//! [`PipelineLoader`] hands out one [`PipelineHandle`] per worker lifetime.
//! The first caller starts the load; everyone arriving before it finishes
//! awaits the same shared future.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::pipeline::{PipelineFactory, PipelineHandle};
use super::progress::{LoadEvent, LoadProgress};
use crate::error::EmbeddingError;
use crate::observability::metrics;

/// Callback receiving progress for the load it started.
pub type ProgressCallback = Box<dyn Fn(LoadProgress) + Send + Sync>;

type LoadResult = Result<PipelineHandle, EmbeddingError>;
type LoadFuture = Shared<BoxFuture<'static, LoadResult>>;

/// What happens after a load fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LoadRetryPolicy {
    /// Forget the failure; the next call starts a fresh load.
    #[default]
    Retry,
    /// Keep returning the cached failure.
    Sticky,
}

struct LoadSlot {
    generation: u64,
    future: LoadFuture,
}

/// Get-or-create accessor for the shared pipeline.
pub struct PipelineLoader {
    factory: Arc<dyn PipelineFactory>,
    policy: LoadRetryPolicy,
    slot: Mutex<Option<LoadSlot>>,
    generation: AtomicU64,
    instantiations: AtomicUsize,
}

impl PipelineLoader {
    /// Create a loader. Nothing is loaded until the first request.
    #[must_use]
    pub fn new(factory: Arc<dyn PipelineFactory>, policy: LoadRetryPolicy) -> Self {
        Self {
            factory,
            policy,
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
            instantiations: AtomicUsize::new(0),
        }
    }

    /// Return the shared pipeline, loading it on first use.
    ///
    /// `on_progress` only receives events if this call starts the load;
    /// callers joining an in-flight or finished load have it dropped. Under
    /// [`LoadRetryPolicy::Retry`] a load that already failed is never joined.
    ///
    /// # Errors
    ///
    /// Returns the load's error. Every waiter on a failed load sees the same
    /// error.
    pub async fn get_instance(&self, on_progress: Option<ProgressCallback>) -> LoadResult {
        let (generation, future) = {
            let mut slot = self.slot.lock();
            let reusable = slot
                .as_ref()
                .filter(|existing| {
                    self.policy == LoadRetryPolicy::Sticky
                        || !matches!(existing.future.peek(), Some(Err(_)))
                })
                .map(|existing| (existing.generation, existing.future.clone()));

            if let Some(found) = reusable {
                found
            } else {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let future = self.start_load(on_progress);
                *slot = Some(LoadSlot {
                    generation,
                    future: future.clone(),
                });
                (generation, future)
            }
        };

        let result = future.await;

        if let Err(e) = &result {
            if self.policy == LoadRetryPolicy::Retry {
                let mut slot = self.slot.lock();
                if slot.as_ref().is_some_and(|s| s.generation == generation) {
                    *slot = None;
                    tracing::warn!(error = %e, "Pipeline load failed, next request will retry");
                }
            }
        }

        result
    }

    /// Load (or join the load) and observe it as a stream of events.
    ///
    /// Yields progress for loads this call starts, then exactly one `Ready`
    /// or `Failed`. Must be called inside a tokio runtime.
    pub fn load_events(self: &Arc<Self>) -> impl Stream<Item = LoadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let progress_tx = tx.clone();
        let loader = Arc::clone(self);

        tokio::spawn(async move {
            let on_progress: ProgressCallback = Box::new(move |p| {
                let _ = progress_tx.send(LoadEvent::Progress(p));
            });
            let terminal = match loader.get_instance(Some(on_progress)).await {
                Ok(handle) => LoadEvent::Ready(handle),
                Err(e) => LoadEvent::Failed(e),
            };
            let _ = tx.send(terminal);
        });

        UnboundedReceiverStream::new(rx)
    }

    /// The pipeline, if a load has already succeeded.
    #[must_use]
    pub fn loaded(&self) -> Option<PipelineHandle> {
        let slot = self.slot.lock();
        slot.as_ref()
            .and_then(|s| s.future.peek())
            .and_then(|result| result.as_ref().ok().cloned())
    }

    /// How many times the factory has been asked to build a pipeline.
    #[must_use]
    pub fn instantiations(&self) -> usize {
        self.instantiations.load(Ordering::SeqCst)
    }

    /// Configured failure policy.
    #[must_use]
    pub const fn policy(&self) -> LoadRetryPolicy {
        self.policy
    }

    fn start_load(&self, on_progress: Option<ProgressCallback>) -> LoadFuture {
        self.instantiations.fetch_add(1, Ordering::SeqCst);
        metrics::PIPELINE_LOADS.inc();

        let factory = Arc::clone(&self.factory);
        let model_id = factory.model_id().to_string();
        tracing::info!(task = factory.task(), model = %model_id, "Initializing embedding pipeline");

        async move {
            let started = Instant::now();
            let blocking_model_id = model_id.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let report = |p: LoadProgress| {
                    if let Some(callback) = &on_progress {
                        callback(p);
                    }
                };
                factory
                    .create(&report)
                    .map(|extractor| PipelineHandle::new(extractor, blocking_model_id))
            })
            .await;

            let result = joined.unwrap_or_else(|e| {
                Err(EmbeddingError::ModelLoad(format!("load task aborted: {e}")))
            });

            let seconds = started.elapsed().as_secs_f64();
            match &result {
                Ok(handle) => {
                    metrics::PIPELINE_LOAD_SECONDS.observe(seconds);
                    tracing::info!(
                        model = %model_id,
                        dimension = handle.dimension(),
                        "Pipeline ready in {seconds:.2}s"
                    );
                }
                Err(e) => {
                    metrics::PIPELINE_LOAD_FAILURES.inc();
                    tracing::error!(model = %model_id, error = %e, "Pipeline load failed");
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for PipelineLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLoader")
            .field("model_id", &self.factory.model_id())
            .field("policy", &self.policy)
            .field("instantiations", &self.instantiations())
            .finish_non_exhaustive()
    }
}
