//! Embedding worker.
//!
//! One dedicated thread owns the pipeline loader and serves requests in the
//! order they were posted. The owner talks to it only through channels:
//! [`EmbeddingWorker::post_message`] in, [`EmbeddingWorker::next_message`] out.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use super::loader::PipelineLoader;
use super::pipeline::PipelineHandle;
use super::progress::{LoadEvent, LoadProgress};
use super::protocol::{EmbeddingRequest, ErrorKind, OutboundMessage};
use crate::error::{EmbeddingError, ProtocolError};
use crate::observability::metrics;
use crate::Result;

/// Handle to the background embedding worker.
pub struct EmbeddingWorker {
    inbound: Option<mpsc::Sender<Value>>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl EmbeddingWorker {
    /// Start the worker thread.
    ///
    /// # Arguments
    ///
    /// * `loader` - Pipeline loader owned by the worker for its lifetime
    /// * `queue_capacity` - How many requests may wait before `post_message` blocks
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(loader: Arc<PipelineLoader>, queue_capacity: usize) -> Result<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(queue_capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("embedding-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to start embedding worker runtime");
                        return;
                    }
                };
                let _ = runtime.block_on(relay_loop(loader, inbound_rx, outbound_tx));
            })
            .map_err(|e| EmbeddingError::WorkerClosed(format!("failed to spawn worker: {e}")))?;

        tracing::info!(queue_capacity, "Embedding worker started");

        Ok(Self {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
            thread: Some(thread),
        })
    }

    /// Post a raw message to the worker.
    ///
    /// Waits if the inbound queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has shut down.
    pub async fn post_message(&self, message: Value) -> Result<()> {
        let inbound = self
            .inbound
            .as_ref()
            .ok_or_else(|| EmbeddingError::WorkerClosed("worker terminated".to_string()))?;

        metrics::WORKER_QUEUE_DEPTH.inc();
        inbound.send(message).await.map_err(|_| {
            metrics::WORKER_QUEUE_DEPTH.dec();
            EmbeddingError::WorkerClosed("worker inbound queue closed".to_string())
        })?;
        Ok(())
    }

    /// Post a typed request.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has shut down.
    pub async fn post(&self, request: &EmbeddingRequest) -> Result<()> {
        self.post_message(request.to_value()).await
    }

    /// Receive the next outbound message, in the order the worker sent them.
    ///
    /// Returns `None` once the worker has exited and all messages are drained.
    pub async fn next_message(&mut self) -> Option<OutboundMessage> {
        self.outbound.recv().await
    }

    /// Embed one text and wait for its completion.
    ///
    /// Progress messages are passed to `on_progress`. Do not interleave with
    /// raw `post_message` calls whose replies are still outstanding.
    ///
    /// # Errors
    ///
    /// Returns the worker's error response, or an error if the worker exited.
    pub async fn embed(
        &mut self,
        text: &str,
        mut on_progress: impl FnMut(&LoadProgress),
    ) -> Result<Vec<f32>> {
        self.post(&EmbeddingRequest::new(text)).await?;

        while let Some(message) = self.next_message().await {
            match message {
                OutboundMessage::Progress { progress } => on_progress(&progress),
                OutboundMessage::Complete { output } => return Ok(output),
                OutboundMessage::Error { kind, error } => {
                    return Err(match kind {
                        ErrorKind::Protocol => ProtocolError::Malformed(error).into(),
                        ErrorKind::Load => EmbeddingError::ModelLoad(error).into(),
                        ErrorKind::Inference => EmbeddingError::Inference(error).into(),
                    });
                }
            }
        }

        Err(EmbeddingError::WorkerClosed("worker exited before replying".to_string()).into())
    }

    /// Stop accepting requests and wait for the thread to finish.
    ///
    /// Requests already queued are still served; their replies are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked.
    pub async fn terminate(mut self) -> Result<()> {
        self.inbound = None;
        self.outbound.close();

        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| EmbeddingError::WorkerClosed(format!("join task failed: {e}")))?
                .map_err(|_| EmbeddingError::WorkerClosed("worker thread panicked".to_string()))?;
        }

        tracing::info!("Embedding worker terminated");
        Ok(())
    }
}

impl std::fmt::Debug for EmbeddingWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingWorker")
            .field("accepting", &self.inbound.is_some())
            .field("running", &self.thread.as_ref().is_some_and(|t| !t.is_finished()))
            .finish_non_exhaustive()
    }
}

/// Serve inbound messages one at a time until the owner goes away.
///
/// Returns how many queued messages were dropped unserved.
async fn relay_loop(
    loader: Arc<PipelineLoader>,
    mut inbound: mpsc::Receiver<Value>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
) -> usize {
    while let Some(message) = inbound.recv().await {
        metrics::WORKER_QUEUE_DEPTH.dec();

        let reply = handle_message(&loader, &message, &outbound).await;
        metrics::RELAY_MESSAGES
            .with_label_values(&[reply.status()])
            .inc();

        if outbound.send(reply).is_err() {
            tracing::debug!("Owner dropped, embedding worker shutting down");
            break;
        }
    }

    let unserved = drain_unserved(&mut inbound);
    tracing::debug!(unserved, "Embedding worker loop exited");
    unserved
}

/// Close the inbound queue and discard what is left in it.
fn drain_unserved(inbound: &mut mpsc::Receiver<Value>) -> usize {
    inbound.close();
    let mut dropped = 0;
    while inbound.try_recv().is_ok() {
        metrics::WORKER_QUEUE_DEPTH.dec();
        dropped += 1;
    }
    dropped
}

/// Produce the terminal reply for one inbound message.
async fn handle_message(
    loader: &Arc<PipelineLoader>,
    message: &Value,
    outbound: &mpsc::UnboundedSender<OutboundMessage>,
) -> OutboundMessage {
    let request = match EmbeddingRequest::from_value(message) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed message");
            return OutboundMessage::error(ErrorKind::Protocol, e);
        }
    };

    let handle = match acquire_pipeline(loader, outbound).await {
        Ok(handle) => handle,
        Err(e) => return OutboundMessage::error(ErrorKind::Load, e),
    };

    let started = Instant::now();
    match handle.embed(&request.text) {
        Ok(output) => {
            let seconds = started.elapsed().as_secs_f64();
            metrics::INFERENCE_SECONDS.observe(seconds);
            tracing::debug!(dimension = output.len(), "Embedding generated in {seconds:.2}s");
            OutboundMessage::Complete { output }
        }
        Err(e) => {
            tracing::error!(error = %e, "Embedding failed");
            OutboundMessage::error(ErrorKind::Inference, e)
        }
    }
}

/// Get the pipeline, forwarding load progress to the owner.
async fn acquire_pipeline(
    loader: &Arc<PipelineLoader>,
    outbound: &mpsc::UnboundedSender<OutboundMessage>,
) -> std::result::Result<PipelineHandle, EmbeddingError> {
    if let Some(handle) = loader.loaded() {
        return Ok(handle);
    }

    let mut events = Box::pin(loader.load_events());
    while let Some(event) = events.next().await {
        match event {
            LoadEvent::Progress(progress) => {
                metrics::RELAY_MESSAGES
                    .with_label_values(&["progress"])
                    .inc();
                let _ = outbound.send(OutboundMessage::Progress { progress });
            }
            LoadEvent::Ready(handle) => return Ok(handle),
            LoadEvent::Failed(e) => return Err(e),
        }
    }

    Err(EmbeddingError::WorkerClosed(
        "load ended without a terminal event".to_string(),
    ))
}
