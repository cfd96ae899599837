use std::sync::Arc;

use common::{BackendError, Batch, StorageBackend};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

use super::dead_letter::{DeadLetter, DeadLetterStore};
use crate::config::RetryPolicy;
use crate::metrics::Metrics;

/// Delivery worker draining the dispatch queue.
///
/// Each worker takes one batch at a time and keeps retrying it, with
/// exponential backoff, until the backend accepts it or the retry budget is
/// spent. A batch is never put back on the queue, so a failing batch cannot
/// overtake or starve the ones behind it. Spent batches go to the dead letter
/// store.
pub(crate) struct Dispatcher {
    worker_id: usize,
    dispatch_rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    backend: Arc<dyn StorageBackend>,
    retry: RetryPolicy,
    dead_letters: Arc<DeadLetterStore>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub(crate) fn new(
        worker_id: usize,
        dispatch_rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
        backend: Arc<dyn StorageBackend>,
        retry: RetryPolicy,
        dead_letters: Arc<DeadLetterStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            worker_id,
            dispatch_rx,
            backend,
            retry,
            dead_letters,
            metrics,
        }
    }

    pub(crate) fn run(self) -> tokio::task::JoinHandle<Result<(), String>> {
        tokio::task::spawn(async move { self.run_dispatcher().await })
    }

    async fn run_dispatcher(self) -> Result<(), String> {
        loop {
            let next = {
                let mut rx = self.dispatch_rx.lock().await;
                rx.recv().await
            };
            let Some(batch) = next else {
                // Queue closed and drained
                break;
            };
            self.deliver(batch).await;
        }
        tracing::debug!(worker = self.worker_id, "Dispatcher stopped");
        Ok(())
    }

    async fn deliver(&self, batch: Batch) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let write =
                tokio::time::timeout(self.retry.write_timeout, self.backend.write_batch(&batch));
            let outcome = match write.await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Storage(format!(
                    "write timed out after {:?}",
                    self.retry.write_timeout
                ))),
            };

            match outcome {
                Ok(()) => {
                    self.metrics
                        .batch_write_duration_seconds
                        .observe(started.elapsed().as_secs_f64());
                    self.metrics.batches_written_total.inc();
                    self.metrics
                        .measurements_written_total
                        .inc_by(batch.len() as u64);
                    tracing::debug!(
                        worker = self.worker_id,
                        rows = batch.len(),
                        attempt,
                        "Batch written"
                    );
                    return;
                }
                Err(err) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    self.metrics.batch_write_retries_total.inc();
                    tracing::warn!(
                        worker = self.worker_id,
                        rows = batch.len(),
                        attempt,
                        ?delay,
                        error = %err,
                        "Batch write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    self.metrics.batches_dead_lettered_total.inc();
                    tracing::error!(
                        worker = self.worker_id,
                        rows = batch.len(),
                        attempts = attempt,
                        error = %err,
                        "Batch write failed, giving up"
                    );
                    self.dead_letters.push(DeadLetter {
                        batch,
                        attempts: attempt,
                        error: err.to_string(),
                    });
                    self.metrics.dead_letters.set(self.dead_letters.len() as i64);
                    return;
                }
            }
        }
    }
}
