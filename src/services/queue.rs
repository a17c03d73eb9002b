use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::watch;

use crate::db::models::NotificationJob;
use crate::db::repository::NotificationJobRepository;
use crate::error::AppError;

/// Bounded retries when a claim statement loses a race or hits contention.
const CLAIM_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("notification job {0} is owned by another worker")]
    JobAlreadyOwned(i64),

    #[error(transparent)]
    Database(#[from] AppError),
}

/// Outcome of one `take()` call.
pub enum TakeOutcome {
    /// A job was claimed; the handle finalizes it.
    Claimed(JobHandle),
    /// Nothing became eligible within one poll interval.
    Empty,
    /// The queue was stopped; no further work will be yielded.
    Stopped,
}

/// A claimed job bundled with its finalization.
///
/// The claim was written when the handle was produced; `finish` writes the
/// terminal state. A handle dropped without finishing leaves the row
/// claimed, which an operational sweeper outside this service has to
/// recover.
pub struct JobHandle {
    job: NotificationJob,
    pool: SqlitePool,
    owner: String,
    finalized: bool,
}

impl JobHandle {
    pub fn job(&self) -> &NotificationJob {
        &self.job
    }

    /// Mark the job terminal with the given outcome.
    ///
    /// Fails with `JobAlreadyOwned` when the row is no longer held by this
    /// instance; nothing is written in that case.
    pub async fn finish(mut self, successful: bool) -> Result<(), QueueError> {
        self.finalized = true;
        let updated =
            NotificationJobRepository::finalize(&self.pool, self.job.id, &self.owner, successful)
                .await?;
        if updated {
            Ok(())
        } else {
            Err(QueueError::JobAlreadyOwned(self.job.id))
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if !self.finalized {
            tracing::warn!(
                job_id = self.job.id,
                "claimed job dropped without finalization; the row stays claimed"
            );
        }
    }
}

/// Work queue over the delivery job table, shared by every instance of the
/// fleet pointing at the same database. Claims are arbitrated by the atomic
/// claim statement in the repository, so `take()` is safe under concurrent
/// callers in one process and across processes.
pub struct DatabaseJobQueue {
    pool: SqlitePool,
    owner: String,
    poll_interval: Duration,
    started: AtomicBool,
    stop: watch::Sender<bool>,
}

impl DatabaseJobQueue {
    pub fn new(pool: SqlitePool, owner: impl Into<String>, poll_interval: Duration) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            pool,
            owner: owner.into(),
            poll_interval,
            started: AtomicBool::new(false),
            stop,
        }
    }

    /// Idempotent.
    pub fn start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            tracing::info!(owner = %self.owner, "job queue started");
        }
    }

    /// Signal shutdown. Every blocked `take()` wakes and returns `Stopped`.
    /// Idempotent.
    pub fn stop(&self) {
        if !self.stop.send_replace(true) {
            tracing::info!(owner = %self.owner, "job queue stopping");
        }
    }

    /// Claim and return one eligible job.
    ///
    /// Returns `Empty` when nothing became eligible within one poll
    /// interval, and `Stopped` as soon as `stop()` has been called.
    pub async fn take(&self) -> TakeOutcome {
        let mut stop = self.stop.subscribe();
        if *stop.borrow() {
            return TakeOutcome::Stopped;
        }

        for attempt in 1..=CLAIM_ATTEMPTS {
            let now = Utc::now().naive_utc();
            match NotificationJobRepository::claim_next(&self.pool, &self.owner, now).await {
                Ok(Some(job)) => {
                    tracing::debug!(job_id = job.id, owner = %self.owner, "claimed job");
                    return TakeOutcome::Claimed(JobHandle {
                        job,
                        pool: self.pool.clone(),
                        owner: self.owner.clone(),
                        finalized: false,
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(attempt, "claim attempt failed: {:?}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }

        tokio::select! {
            _ = stop.changed() => TakeOutcome::Stopped,
            _ = tokio::time::sleep(self.poll_interval) => TakeOutcome::Empty,
        }
    }
}
