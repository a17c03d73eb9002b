use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::services::notifier::Notifier;
use crate::services::queue::JobHandle;

#[derive(Debug, thiserror::Error)]
#[error("worker pool is stopped")]
pub struct PoolStopped;

/// Fixed-size pool of delivery workers consuming claimed jobs.
///
/// Workers share one bounded channel; a worker that fails a job logs and
/// keeps looping. Workers exit once the pool is stopped and the channel is
/// drained.
pub struct WorkerPool {
    tx: Option<mpsc::Sender<JobHandle>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(num_workers: usize, notifier: Arc<Notifier>) -> Self {
        let (tx, rx) = mpsc::channel::<JobHandle>(1);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..num_workers.max(1))
            .map(|worker_id| {
                let rx = rx.clone();
                let notifier = notifier.clone();
                tokio::spawn(async move {
                    loop {
                        let handle = { rx.lock().await.recv().await };
                        match handle {
                            Some(job_handle) => {
                                if let Err(e) = notifier.process(job_handle).await {
                                    tracing::warn!(worker_id, "delivery worker error: {:?}", e);
                                }
                            }
                            None => break,
                        }
                    }
                    tracing::debug!(worker_id, "delivery worker exited");
                })
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Hand one claimed job to a worker. Awaits while every worker is busy,
    /// which is the backpressure that paces claiming against delivery.
    pub async fn submit(&self, handle: JobHandle) -> Result<(), PoolStopped> {
        match &self.tx {
            Some(tx) => tx.send(handle).await.map_err(|_| PoolStopped),
            None => Err(PoolStopped),
        }
    }

    /// Close the intake. Workers finish jobs already in flight, drain the
    /// channel, and exit. Idempotent.
    pub fn stop(&mut self) {
        self.tx.take();
    }

    /// Wait for every worker to exit, bounded by a shared deadline.
    pub async fn join(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        for worker in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, worker).await.is_err() {
                tracing::warn!("delivery worker did not exit before the join deadline");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewNotification;
    use crate::db::repository::{NotificationJobRepository, NotificationRepository};
    use crate::db::testutil::{insert_user, test_pool};
    use crate::services::providers::testing::RecordingProvider;
    use crate::services::queue::{DatabaseJobQueue, TakeOutcome};
    use chrono::Utc;
    use sqlx::SqlitePool;

    async fn seed_jobs(pool: &SqlitePool, count: usize) {
        let user = insert_user(pool, "alice@example.com", "Alice", "Smith").await;
        let now = Utc::now().naive_utc();
        for i in 0..count {
            let new = NewNotification {
                token: format!("tok-{}", i),
                context: "t".to_string(),
                priority: 50,
                subject: "s".to_string(),
                plain_text: Some("p".to_string()),
                html_text: None,
            };
            NotificationRepository::create_with_jobs(pool, new, &[user], now, 3)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn pool_processes_submitted_jobs_and_drains_on_stop() {
        let pool = test_pool().await;
        seed_jobs(&pool, 3).await;

        let provider = Arc::new(RecordingProvider::default());
        let notifier = Arc::new(Notifier::new(pool.clone(), provider.clone(), 1, 300));
        let mut workers = WorkerPool::start(2, notifier);

        let queue = DatabaseJobQueue::new(pool.clone(), "w", Duration::from_millis(10));
        queue.start();
        let mut submitted = Vec::new();
        while let TakeOutcome::Claimed(handle) = queue.take().await {
            submitted.push(handle.job().id);
            workers.submit(handle).await.unwrap();
        }
        assert_eq!(submitted.len(), 3);

        workers.stop();
        workers.join(Duration::from_secs(2)).await;

        assert_eq!(provider.sent.lock().unwrap().len(), 3);
        for job_id in submitted {
            let job = NotificationJobRepository::find_by_id(&pool, job_id)
                .await
                .unwrap()
                .unwrap();
            assert!(job.is_terminal());
            assert_eq!(job.successful, Some(true));
        }
    }

    #[tokio::test]
    async fn submit_fails_after_stop() {
        let pool = test_pool().await;
        seed_jobs(&pool, 1).await;

        let notifier = Arc::new(Notifier::new(
            pool.clone(),
            Arc::new(RecordingProvider::default()),
            1,
            300,
        ));
        let mut workers = WorkerPool::start(1, notifier);
        workers.stop();
        workers.stop(); // idempotent
        workers.join(Duration::from_secs(1)).await;

        let queue = DatabaseJobQueue::new(pool.clone(), "w", Duration::from_millis(10));
        queue.start();
        match queue.take().await {
            TakeOutcome::Claimed(handle) => {
                assert!(workers.submit(handle).await.is_err());
            }
            _ => panic!("expected a claimable job"),
        }
    }
}
