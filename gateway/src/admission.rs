//! Query admission control.
//!
//! The backend handles one read at a time well and degrades badly under
//! concurrent reads, so every read goes through a [`QueryGate`] holding a
//! single ticket. Writes never touch the gate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::BackendResult;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;

/// Single-ticket gate serializing backend reads.
///
/// Waiters are woken in whatever order tokio's semaphore provides; only mutual
/// exclusion is guaranteed. The ticket is released when the read completes,
/// fails, times out, or is cancelled.
pub struct QueryGate {
    ticket: Semaphore,
    admission_timeout: Duration,
    query_timeout: Duration,
    slow_query_threshold: Duration,
    metrics: Arc<Metrics>,
}

impl QueryGate {
    pub fn new(config: &QueryConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            ticket: Semaphore::new(1),
            admission_timeout: config.admission_timeout,
            query_timeout: config.query_timeout,
            slow_query_threshold: config.slow_query_threshold,
            metrics,
        }
    }

    /// Runs `query` while holding the ticket.
    ///
    /// `query` must be lazy (an `async` block or `async fn` call); it is not
    /// polled until the ticket is held. `label` identifies the read in logs.
    pub async fn run<T, F>(&self, label: &str, query: F) -> Result<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        let waiting = WaitingGuard::new(&self.metrics);
        let admission = tokio::time::timeout(self.admission_timeout, self.ticket.acquire());
        let _permit = match admission.await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::Internal("query gate closed".to_string())),
            Err(_) => {
                self.metrics.query_admission_timeouts_total.inc();
                tracing::warn!(
                    query = label,
                    timeout = ?self.admission_timeout,
                    "Query admission timed out"
                );
                return Err(Error::AdmissionTimeout(self.admission_timeout));
            }
        };
        drop(waiting);

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.query_timeout, query).await;
        let elapsed = started.elapsed();
        self.metrics
            .query_duration_seconds
            .observe(elapsed.as_secs_f64());
        if elapsed > self.slow_query_threshold {
            self.metrics.slow_queries_total.inc();
            tracing::warn!(
                query = label,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow query"
            );
        }

        match outcome {
            Ok(result) => result.map_err(Error::from),
            Err(_) => {
                self.metrics.query_timeouts_total.inc();
                tracing::warn!(query = label, timeout = ?self.query_timeout, "Query timed out");
                Err(Error::QueryTimeout(self.query_timeout))
            }
        }
    }

    /// Whether the ticket is currently free.
    pub fn is_idle(&self) -> bool {
        self.ticket.available_permits() == 1
    }
}

/// Tracks the waiting gauge, including callers dropped mid-wait.
struct WaitingGuard<'a> {
    metrics: &'a Metrics,
}

impl<'a> WaitingGuard<'a> {
    fn new(metrics: &'a Metrics) -> Self {
        metrics.queries_waiting.inc();
        Self { metrics }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.metrics.queries_waiting.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BackendError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gate(admission_timeout: Duration, query_timeout: Duration) -> Arc<QueryGate> {
        let config = QueryConfig {
            admission_timeout,
            query_timeout,
            ..Default::default()
        };
        Arc::new(QueryGate::new(&config, Arc::new(Metrics::new())))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_never_run_two_queries_at_once() {
        // given
        let gate = gate(Duration::from_secs(30), Duration::from_secs(30));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        // when
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let gate = gate.clone();
                let active = active.clone();
                let max_active = max_active.clone();
                tokio::spawn(async move {
                    gate.run("overlap", async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(i)
                    })
                    .await
                })
            })
            .collect();
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        // then
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(results, (0..8).collect::<Vec<_>>());
        assert!(gate.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn should_fail_with_admission_timeout_while_ticket_is_held() {
        // given
        let gate = gate(Duration::from_millis(100), Duration::from_secs(30));
        let holder = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run("holder", async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        // when
        let result = gate.run("waiter", async { Ok(()) }).await;

        // then
        assert_eq!(result, Err(Error::AdmissionTimeout(Duration::from_millis(100))));
        assert!(holder.await.unwrap().is_ok());
        assert_eq!(gate.metrics.query_admission_timeouts_total.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fail_with_query_timeout_and_release_ticket() {
        // given
        let gate = gate(Duration::from_secs(5), Duration::from_millis(200));

        // when
        let result: Result<()> = gate
            .run("hang", async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .await;

        // then
        assert_eq!(result, Err(Error::QueryTimeout(Duration::from_millis(200))));
        assert!(gate.is_idle());
        assert_eq!(gate.run("next", async { Ok(1) }).await, Ok(1));
    }

    #[tokio::test]
    async fn should_release_ticket_when_backend_fails() {
        // given
        let gate = gate(Duration::from_secs(5), Duration::from_secs(5));

        // when
        let result: Result<()> = gate
            .run("failing", async {
                Err(BackendError::Storage("down".to_string()))
            })
            .await;

        // then
        assert_eq!(
            result,
            Err(Error::Backend(BackendError::Storage("down".to_string())))
        );
        assert!(gate.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn should_count_slow_query_without_aborting_it() {
        // given
        let gate = gate(Duration::from_secs(5), Duration::from_secs(5));

        // when
        let result = gate
            .run("slow", async {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok("done")
            })
            .await;

        // then
        assert_eq!(result, Ok("done"));
        assert_eq!(gate.metrics.slow_queries_total.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_release_waiting_gauge_when_caller_is_dropped() {
        // given
        let gate = gate(Duration::from_secs(5), Duration::from_secs(30));
        let holder = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run("holder", async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        // when
        let _ = tokio::time::timeout(
            Duration::from_millis(10),
            gate.run("abandoned", async { Ok(()) }),
        )
        .await;

        // then
        assert_eq!(gate.metrics.queries_waiting.get(), 0);
        holder.await.unwrap().unwrap();
    }
}
