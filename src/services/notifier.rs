use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;

use crate::db::models::NotificationJob;
use crate::db::repository::{NotificationJobRepository, NotificationRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::providers::{Provider, ProviderError};
use crate::services::queue::{JobHandle, QueueError};
use crate::services::template::{self, RenderError};

#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error("recipient user {0} no longer exists")]
    MissingRecipient(i64),

    #[error("notification {0} no longer exists")]
    MissingNotification(i64),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Database(#[from] AppError),
}

/// The delivery worker body: renders a claimed job, hands it to the
/// provider, finalizes the job, and schedules a retry successor when the
/// delivery fails with budget left.
pub struct Notifier {
    pool: SqlitePool,
    provider: Arc<dyn Provider>,
    /// Bounds concurrently live provider sends across the worker pool.
    send_permits: Arc<Semaphore>,
    retry_delay: chrono::Duration,
}

impl Notifier {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn Provider>,
        provider_pool_size: usize,
        retry_delay_seconds: u64,
    ) -> Self {
        Self {
            pool,
            provider,
            send_permits: Arc::new(Semaphore::new(provider_pool_size.max(1))),
            retry_delay: chrono::Duration::seconds(retry_delay_seconds as i64),
        }
    }

    /// Process one claimed job. The job is finalized on every path; errors
    /// from delivery never escape beyond a log record and the retry chain.
    pub async fn process(&self, handle: JobHandle) -> AppResult<()> {
        let job = handle.job().clone();

        match self.deliver(&job).await {
            Ok(()) => match handle.finish(true).await {
                Ok(()) => {
                    tracing::info!(job_id = job.id, recipient_id = job.recipient_id, "delivered");
                    Ok(())
                }
                Err(QueueError::JobAlreadyOwned(id)) => {
                    tracing::warn!(job_id = id, "job owned by another worker; skipping");
                    Ok(())
                }
                Err(QueueError::Database(e)) => Err(e),
            },
            Err(err) => {
                tracing::warn!(
                    job_id = job.id,
                    recipient_id = job.recipient_id,
                    "delivery failed: {}",
                    err
                );
                match handle.finish(false).await {
                    Ok(()) => {
                        self.enqueue_retry(&job).await;
                        Ok(())
                    }
                    Err(QueueError::JobAlreadyOwned(id)) => {
                        // Our claim was never honored; another worker holds
                        // the row, so no retry is scheduled here.
                        tracing::warn!(job_id = id, "job owned by another worker; no retry");
                        Ok(())
                    }
                    Err(QueueError::Database(e)) => Err(e),
                }
            }
        }
    }

    async fn deliver(&self, job: &NotificationJob) -> Result<(), DeliveryError> {
        let user = UserRepository::find_by_id(&self.pool, job.recipient_id)
            .await?
            .ok_or(DeliveryError::MissingRecipient(job.recipient_id))?;
        let notification = NotificationRepository::find_by_id(&self.pool, job.notification_id)
            .await?
            .ok_or(DeliveryError::MissingNotification(job.notification_id))?;

        let mut values = HashMap::new();
        values.insert("first_name".to_string(), user.first_name.clone());
        values.insert("last_name".to_string(), user.last_name.clone());

        let subject = template::render(&notification.subject, &values)?;
        let plain_text = match notification.plain_text.as_deref() {
            Some(text) if !text.is_empty() => Some(template::render(text, &values)?),
            _ => None,
        };
        let html_text = match notification.html_text.as_deref() {
            Some(text) if !text.is_empty() => Some(template::render(text, &values)?),
            _ => None,
        };

        let _permit = self
            .send_permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Transport("provider capacity pool closed".to_string()))?;

        self.provider
            .send(
                &user.email,
                &subject,
                plain_text.as_deref(),
                html_text.as_deref(),
            )
            .await?;

        Ok(())
    }

    /// Insert the retry successor for a failed job, or log that the chain is
    /// exhausted. An insert failure drops the notification for this
    /// recipient; it is logged at error level and nothing else recovers it.
    async fn enqueue_retry(&self, job: &NotificationJob) {
        if job.retries_remaining <= 0 {
            tracing::error!(
                job_id = job.id,
                notification_id = job.notification_id,
                recipient_id = job.recipient_id,
                "retry budget exhausted; giving up"
            );
            return;
        }

        let not_before = Utc::now().naive_utc() + self.retry_delay;
        match NotificationJobRepository::insert_successor(&self.pool, job, not_before).await {
            Ok(successor) => {
                tracing::info!(
                    job_id = job.id,
                    successor_id = successor.id,
                    retries_remaining = successor.retries_remaining,
                    not_before = %successor.not_before,
                    "scheduled retry"
                );
            }
            Err(e) => {
                tracing::error!(
                    job_id = job.id,
                    recipient_id = job.recipient_id,
                    "failed to schedule retry, notification dropped for recipient: {:?}",
                    e
                );
            }
        }
    }
}
