use std::sync::Arc;
use std::time::Duration;

use common::{Batch, BatchBuilder, Measurement};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::metrics::Metrics;

/// Single consumer of the intake queue.
///
/// Appends measurements to the current batch in arrival order and, on every
/// tick, freezes the batch and hands it to the dispatch queue. Ticks that find
/// an empty batch emit nothing.
pub(crate) struct Accumulator {
    intake_rx: mpsc::Receiver<Measurement>,
    dispatch_tx: mpsc::Sender<Batch>,
    tick_interval: Duration,
    builder: BatchBuilder,
    stop_tok: CancellationToken,
    metrics: Arc<Metrics>,
}

impl Accumulator {
    pub(crate) fn new(
        intake_rx: mpsc::Receiver<Measurement>,
        dispatch_tx: mpsc::Sender<Batch>,
        tick_interval: Duration,
        stop_tok: CancellationToken,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            intake_rx,
            dispatch_tx,
            tick_interval,
            builder: BatchBuilder::new(),
            stop_tok,
            metrics,
        }
    }

    pub(crate) fn run(self) -> tokio::task::JoinHandle<Result<(), String>> {
        tokio::task::spawn(async move { self.run_accumulator().await })
    }

    async fn run_accumulator(mut self) -> Result<(), String> {
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        // A hand-off blocked on a full dispatch queue shifts later ticks
        // instead of firing them back to back.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.stop_tok.cancelled() => {
                    break;
                }

                _ = ticker.tick() => {
                    self.hand_off().await?;
                }

                measurement = self.intake_rx.recv() => {
                    match measurement {
                        Some(measurement) => self.append(measurement),
                        None => {
                            // Every producer is gone
                            break;
                        }
                    }
                }
            }
        }

        // Refuse new submissions, then take whatever is already queued
        self.intake_rx.close();
        while let Some(measurement) = self.intake_rx.recv().await {
            self.append(measurement);
        }
        if !self.builder.is_empty() {
            self.emit().await?;
        }
        tracing::debug!("Accumulator stopped");
        // Dropping dispatch_tx here closes the dispatch queue
        Ok(())
    }

    fn append(&mut self, measurement: Measurement) {
        if let Err(err) = self.builder.push(&measurement) {
            self.metrics.measurements_dropped_total.inc();
            tracing::warn!(
                tag_len = measurement.tag.len(),
                error = %err,
                "Dropping unencodable measurement"
            );
        }
    }

    async fn hand_off(&mut self) -> Result<(), String> {
        if self.builder.is_empty() {
            self.metrics.empty_ticks_total.inc();
            tracing::trace!("Tick with no pending measurements");
            return Ok(());
        }
        self.emit().await
    }

    async fn emit(&mut self) -> Result<(), String> {
        let batch = self.builder.take();
        let rows = batch.len();
        self.metrics.batches_emitted_total.inc();
        self.metrics.batch_rows.observe(rows as f64);
        tracing::debug!(rows, bytes = batch.size(), "Emitting batch");
        // Waits while the dispatch queue is full; intake backs up behind it
        self.dispatch_tx
            .send(batch)
            .await
            .map_err(|_| "dispatch queue closed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        intake_tx: mpsc::Sender<Measurement>,
        dispatch_rx: mpsc::Receiver<Batch>,
        stop_tok: CancellationToken,
        metrics: Arc<Metrics>,
        task: tokio::task::JoinHandle<Result<(), String>>,
    }

    fn start(tick: Duration, dispatch_capacity: usize) -> Fixture {
        let (intake_tx, intake_rx) = mpsc::channel(1024);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(dispatch_capacity);
        let stop_tok = CancellationToken::new();
        let metrics = Arc::new(Metrics::new());
        let task = Accumulator::new(
            intake_rx,
            dispatch_tx,
            tick,
            stop_tok.clone(),
            metrics.clone(),
        )
        .run();
        Fixture {
            intake_tx,
            dispatch_rx,
            stop_tok,
            metrics,
            task,
        }
    }

    fn measurement(ts: i64) -> Measurement {
        Measurement::new(ts, "sensor", vec![ts as f64])
    }

    #[tokio::test(start_paused = true)]
    async fn should_emit_measurements_in_arrival_order_on_tick() {
        // given
        let mut fixture = start(Duration::from_secs(1), 5);
        for ts in [3, 1, 2] {
            fixture.intake_tx.send(measurement(ts)).await.unwrap();
        }

        // when
        let batch = fixture.dispatch_rx.recv().await.unwrap();

        // then
        let timestamps: Vec<i64> = batch.decode().unwrap().iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![3, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_emit_batch_on_empty_tick() {
        // given
        let mut fixture = start(Duration::from_secs(1), 5);

        // when
        tokio::time::sleep(Duration::from_millis(3500)).await;

        // then
        assert!(fixture.dispatch_rx.try_recv().is_err());
        assert_eq!(fixture.metrics.empty_ticks_total.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_start_new_batch_after_each_tick() {
        // given
        let mut fixture = start(Duration::from_secs(1), 5);
        fixture.intake_tx.send(measurement(1)).await.unwrap();
        let first = fixture.dispatch_rx.recv().await.unwrap();

        // when
        fixture.intake_tx.send(measurement(2)).await.unwrap();
        fixture.intake_tx.send(measurement(3)).await.unwrap();
        let second = fixture.dispatch_rx.recv().await.unwrap();

        // then
        assert_eq!(first.len(), 1);
        assert_eq!(second.decode().unwrap(), vec![measurement(2), measurement(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_flush_pending_measurements_on_stop() {
        // given
        let mut fixture = start(Duration::from_secs(3600), 5);
        fixture.intake_tx.send(measurement(1)).await.unwrap();
        fixture.intake_tx.send(measurement(2)).await.unwrap();

        // when
        fixture.stop_tok.cancel();
        fixture.task.await.unwrap().unwrap();

        // then
        let batch = fixture.dispatch_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(fixture.dispatch_rx.recv().await.is_none());
        assert!(fixture.intake_tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn should_drop_measurement_with_oversized_tag() {
        // given
        let mut fixture = start(Duration::from_secs(1), 5);
        let oversized = Measurement::new(1, "x".repeat(70_000), vec![1.0]);

        // when
        fixture.intake_tx.send(oversized).await.unwrap();
        fixture.intake_tx.send(measurement(2)).await.unwrap();
        let batch = fixture.dispatch_rx.recv().await.unwrap();

        // then
        assert_eq!(batch.decode().unwrap(), vec![measurement(2)]);
        assert_eq!(fixture.metrics.measurements_dropped_total.get(), 1);
        assert_eq!(fixture.metrics.measurements_rejected_total.get(), 0);
    }
}
