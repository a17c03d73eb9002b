use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::NotifierConfig;
use crate::services::notifier::Notifier;
use crate::services::providers::Provider;
use crate::services::queue::{DatabaseJobQueue, TakeOutcome};
use crate::services::worker::WorkerPool;

/// Owns the job queue, the worker pool, and the monitor task that moves
/// claimed jobs from one to the other.
pub struct JobMonitor {
    queue: Arc<DatabaseJobQueue>,
    monitor: Option<JoinHandle<()>>,
}

impl JobMonitor {
    /// Bring up queue, pool, and the monitor loop.
    ///
    /// Each fleet instance claims under its own identifier so a row's owner
    /// names the process that took it.
    pub fn start(pool: SqlitePool, config: &NotifierConfig, provider: Arc<dyn Provider>) -> Self {
        let owner = format!("notification-delivery-{}", Uuid::new_v4().simple());
        let queue = Arc::new(DatabaseJobQueue::new(
            pool.clone(),
            owner,
            Duration::from_secs(config.poll_seconds),
        ));
        queue.start();

        let notifier = Arc::new(Notifier::new(
            pool,
            provider,
            config.pool_size,
            config.job_retry_seconds,
        ));
        let workers = WorkerPool::start(config.threads, notifier);
        let worker_join_timeout = Duration::from_secs(config.join_timeout_seconds);

        let monitor = tokio::spawn(Self::run(queue.clone(), workers, worker_join_timeout));

        Self {
            queue,
            monitor: Some(monitor),
        }
    }

    /// Move claimed jobs into the pool until the queue stops, then wind the
    /// pool down. Workers already executing a job finish it.
    async fn run(queue: Arc<DatabaseJobQueue>, mut workers: WorkerPool, join_timeout: Duration) {
        loop {
            match queue.take().await {
                TakeOutcome::Claimed(handle) => {
                    // submit() waits while every worker is busy, which is
                    // what paces claiming against delivery.
                    if let Err(e) = workers.submit(handle).await {
                        tracing::warn!("worker pool rejected a claimed job: {}", e);
                        break;
                    }
                }
                TakeOutcome::Empty => continue,
                TakeOutcome::Stopped => break,
            }
        }

        workers.stop();
        workers.join(join_timeout).await;
        tracing::info!("job monitor exited");
    }

    /// Signal shutdown: the queue wakes every blocked `take()`, the monitor
    /// loop breaks, and the pool drains. Idempotent.
    pub fn stop(&mut self) {
        self.queue.stop();
    }

    /// Wait for the monitor task (and, through it, the workers) to exit,
    /// bounded by `timeout`.
    pub async fn join(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        if let Some(monitor) = self.monitor.take() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, monitor).await.is_err() {
                tracing::warn!("job monitor did not exit before the join deadline");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::models::NewNotification;
    use crate::db::repository::{NotificationJobRepository, NotificationRepository};
    use crate::db::testutil::{insert_user, test_pool};
    use crate::services::providers::testing::RecordingProvider;
    use chrono::Utc;

    fn test_config() -> NotifierConfig {
        let mut notifier = Config::default().notifier;
        notifier.threads = 2;
        notifier.poll_seconds = 1;
        notifier
    }

    #[tokio::test]
    async fn monitor_drains_jobs_end_to_end() {
        let pool = test_pool().await;
        let alice = insert_user(&pool, "alice@example.com", "Alice", "Smith").await;
        let bob = insert_user(&pool, "bob@example.com", "Bob", "Jones").await;
        let now = Utc::now().naive_utc();
        let new = NewNotification {
            token: "tok".to_string(),
            context: "t".to_string(),
            priority: 50,
            subject: "Hello ${first_name}".to_string(),
            plain_text: Some("p".to_string()),
            html_text: None,
        };
        let (notification, _) =
            NotificationRepository::create_with_jobs(&pool, new, &[alice, bob], now, 3)
                .await
                .unwrap();

        let provider = Arc::new(RecordingProvider::default());
        let mut monitor = JobMonitor::start(pool.clone(), &test_config(), provider.clone());

        // Both jobs become terminal within a few poll rounds.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let jobs = NotificationJobRepository::list_for_notification(&pool, notification.id)
                .await
                .unwrap();
            if jobs.iter().all(|j| j.is_terminal()) {
                assert!(jobs.iter().all(|j| j.successful == Some(true)));
                break;
            }
            assert!(Instant::now() < deadline, "jobs were not processed in time");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        assert_eq!(provider.sent.lock().unwrap().len(), 2);

        monitor.stop();
        monitor.join(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn shutdown_is_prompt_when_idle() {
        let pool = test_pool().await;
        let provider = Arc::new(RecordingProvider::default());
        let mut monitor = JobMonitor::start(pool, &test_config(), provider);

        let started = Instant::now();
        monitor.stop();
        monitor.stop(); // idempotent
        monitor.join(Duration::from_secs(5)).await;
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "shutdown should complete well inside the deadline"
        );
    }
}
