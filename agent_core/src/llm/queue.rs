//! Rate-limited FIFO queue in front of a provider.
//!
//! A single background task drains the queue: one request in flight at a
//! time, consecutive calls started at least `delay` apart. Cancelling the
//! queue rejects the in-flight request and everything still waiting with
//! [`LlmError::Cancelled`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::providers::TextProvider;
use super::types::{GenerationRequest, GenerationResponse, LlmError};

type Reply = oneshot::Sender<Result<GenerationResponse, LlmError>>;

struct Job {
    request: GenerationRequest,
    reply: Reply,
}

/// Handle to the queue worker. Dropping it cancels the queue.
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<Job>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RequestQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(provider: Arc<dyn TextProvider>, delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run_worker(provider, delay, receiver, cancel.clone()));
        Self { sender, cancel }
    }

    /// Queue a request and wait for its result.
    pub async fn submit(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        if self.cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        let (reply, result) = oneshot::channel();
        self.sender
            .send(Job { request, reply })
            .map_err(|_| LlmError::Cancelled)?;
        result.await.unwrap_or(Err(LlmError::Cancelled))
    }

    /// Reject the in-flight request and every pending one.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    provider: Arc<dyn TextProvider>,
    delay: Duration,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    cancel: CancellationToken,
) {
    let mut last_start: Option<Instant> = None;

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => return,
            },
        };

        if let Some(previous) = last_start {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = job.reply.send(Err(LlmError::Cancelled));
                    break;
                }
                _ = tokio::time::sleep_until(previous + delay) => {}
            }
        }

        last_start = Some(Instant::now());
        debug!(provider = provider.name(), "dispatching queued request");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = provider.complete(job.request) => result,
        };
        let _ = job.reply.send(result);
    }

    receiver.close();
    let mut rejected = 0usize;
    while let Ok(job) = receiver.try_recv() {
        let _ = job.reply.send(Err(LlmError::Cancelled));
        rejected += 1;
    }
    info!(rejected, "request queue cancelled");
}
