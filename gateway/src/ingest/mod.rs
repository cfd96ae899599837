//! Tick-based batching pipeline.
//!
//! Measurements enter through an [`IngestHandle`] into a bounded intake
//! queue. A single accumulator task appends them to the current batch and, on
//! every tick, hands the frozen batch to a small bounded dispatch queue.
//! A pool of dispatcher workers delivers batches to the storage backend with
//! bounded retries; batches that cannot be delivered end up in the
//! [`DeadLetterStore`].
//!
//! ```text
//!  IngestHandle ──▶ intake queue ──▶ Accumulator ──tick──▶ dispatch queue ──▶ Dispatcher(s) ──▶ backend
//!                                                                                  │
//!                                                                                  └──▶ dead letters
//! ```
//!
//! Both queues are bounded, so a slow backend eventually suspends producers
//! instead of growing memory.

mod accumulator;
mod dead_letter;
mod dispatcher;
mod error;
mod handle;

pub use dead_letter::{DeadLetter, DeadLetterStore};
pub use error::{IngestError, IngestResult};
pub use handle::IngestHandle;

use std::sync::Arc;

use common::{Measurement, StorageBackend};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::metrics::Metrics;
use accumulator::Accumulator;
use dispatcher::Dispatcher;

type TaskHandle = JoinHandle<Result<(), String>>;

/// The batching pipeline: one accumulator feeding a pool of dispatchers.
pub struct IngestPipeline {
    intake_tx: mpsc::Sender<Measurement>,
    stop_tok: CancellationToken,
    tasks: Option<(Accumulator, Vec<Dispatcher>)>,
    task_jhs: Option<(TaskHandle, Vec<TaskHandle>)>,
    dead_letters: Arc<DeadLetterStore>,
    metrics: Arc<Metrics>,
}

impl IngestPipeline {
    pub fn new(
        config: &PipelineConfig,
        backend: Arc<dyn StorageBackend>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.dispatch_capacity);
        let dispatch_rx = Arc::new(Mutex::new(dispatch_rx));
        let dead_letters = Arc::new(DeadLetterStore::new(config.dead_letter_capacity));
        let stop_tok = CancellationToken::new();

        let accumulator = Accumulator::new(
            intake_rx,
            dispatch_tx,
            config.tick_interval,
            stop_tok.clone(),
            metrics.clone(),
        );
        let dispatchers = (0..config.dispatch_workers)
            .map(|worker_id| {
                Dispatcher::new(
                    worker_id,
                    dispatch_rx.clone(),
                    backend.clone(),
                    config.retry.clone(),
                    dead_letters.clone(),
                    metrics.clone(),
                )
            })
            .collect();

        Self {
            intake_tx,
            stop_tok,
            tasks: Some((accumulator, dispatchers)),
            task_jhs: None,
            dead_letters,
            metrics,
        }
    }

    /// A new producer handle for the intake queue.
    pub fn handle(&self) -> IngestHandle {
        IngestHandle::new(self.intake_tx.clone())
    }

    /// Undeliverable batches retained while the pipeline runs.
    pub fn dead_letters(&self) -> Arc<DeadLetterStore> {
        self.dead_letters.clone()
    }

    pub fn start(&mut self) {
        let Some((accumulator, dispatchers)) = self.tasks.take() else {
            // already started
            return;
        };
        let dispatcher_jhs = dispatchers.into_iter().map(Dispatcher::run).collect();
        let accumulator_jh = accumulator.run();
        self.task_jhs = Some((accumulator_jh, dispatcher_jhs));
        tracing::info!("Ingest pipeline started");
    }

    /// Stops the pipeline and returns the batches that were never delivered.
    ///
    /// Intake is closed, measurements already queued go out in a final batch,
    /// and every batch in the dispatch queue is delivered (or dead-lettered)
    /// before this returns. The dead letter store is drained into the result
    /// and each letter is logged.
    pub async fn stop(mut self) -> Result<Vec<DeadLetter>, String> {
        let Some((accumulator_jh, dispatcher_jhs)) = self.task_jhs.take() else {
            return Ok(self.drain_dead_letters());
        };
        self.stop_tok.cancel();
        let accumulator_result = accumulator_jh
            .await
            .map_err(|e| format!("accumulator task panicked: {}", e))?;

        // Dispatchers exit once the dispatch queue is closed and empty
        for jh in dispatcher_jhs {
            jh.await
                .map_err(|e| format!("dispatcher task panicked: {}", e))??;
        }
        let letters = self.drain_dead_letters();
        tracing::info!(dead_letters = letters.len(), "Ingest pipeline stopped");
        accumulator_result.map(|()| letters)
    }

    fn drain_dead_letters(&self) -> Vec<DeadLetter> {
        let letters = self.dead_letters.drain();
        self.metrics.dead_letters.set(0);
        for letter in &letters {
            tracing::error!(
                rows = letter.batch.len(),
                attempts = letter.attempts,
                error = %letter.error,
                "Discarding undelivered batch"
            );
        }
        letters
    }
}
