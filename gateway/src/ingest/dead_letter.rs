use std::collections::VecDeque;
use std::sync::Mutex;

use common::Batch;

/// A batch the dispatcher gave up on.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub batch: Batch,
    /// Delivery attempts made, including the first.
    pub attempts: u32,
    /// The error returned by the last attempt.
    pub error: String,
}

/// Bounded holding area for undeliverable batches.
///
/// Keeps the most recent `capacity` entries; the oldest is evicted when full.
pub struct DeadLetterStore {
    capacity: usize,
    letters: Mutex<VecDeque<DeadLetter>>,
}

impl DeadLetterStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            letters: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(crate) fn push(&self, letter: DeadLetter) {
        if self.capacity == 0 {
            tracing::warn!(
                rows = letter.batch.len(),
                "Dead letter store disabled, discarding batch"
            );
            return;
        }
        let mut letters = self.letters.lock().expect("lock poisoned");
        if letters.len() == self.capacity {
            let evicted = letters.pop_front();
            tracing::warn!(
                rows = evicted.map(|l| l.batch.len()).unwrap_or_default(),
                "Dead letter store full, discarding oldest batch"
            );
        }
        letters.push_back(letter);
    }

    /// Copies of the retained letters, oldest first.
    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.letters
            .lock()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Removes and returns every retained letter, oldest first.
    pub fn drain(&self) -> Vec<DeadLetter> {
        self.letters.lock().expect("lock poisoned").drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.letters.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
