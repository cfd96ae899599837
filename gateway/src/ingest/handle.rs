use common::Measurement;
use tokio::sync::mpsc;

use super::{IngestError, IngestResult};

/// Producer side of the intake queue.
///
/// This is the only way measurements enter the pipeline. It can be cloned
/// and shared across request handlers; the queue closes once every handle
/// and the pipeline's own copy are dropped.
#[derive(Clone)]
pub struct IngestHandle {
    intake_tx: mpsc::Sender<Measurement>,
}

impl IngestHandle {
    pub(crate) fn new(intake_tx: mpsc::Sender<Measurement>) -> Self {
        Self { intake_tx }
    }

    /// Submit a measurement, waiting while the intake queue is full.
    ///
    /// Returns once the measurement is accepted into the queue, not once it is
    /// stored. A saturated queue suspends the caller instead of dropping data.
    pub async fn submit(&self, measurement: Measurement) -> IngestResult<()> {
        self.intake_tx
            .send(measurement)
            .await
            .map_err(|_| IngestError::Shutdown)
    }

    /// Submit a measurement without waiting.
    ///
    /// Fails with [`IngestError::Backpressure`] when the intake queue is full.
    pub fn try_submit(&self, measurement: Measurement) -> IngestResult<()> {
        self.intake_tx.try_send(measurement).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => IngestError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => IngestError::Shutdown,
        })
    }

    /// Free slots currently available in the intake queue.
    pub fn available(&self) -> usize {
        self.intake_tx.capacity()
    }
}
