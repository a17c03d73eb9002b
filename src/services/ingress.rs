use std::collections::HashSet;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::NotifierConfig;
use crate::db::models::{NewNotification, NotificationPriority};
use crate::db::repository::{NotificationRepository, UserRepository};
use crate::error::{AppError, AppResult};

/// One `notify` submission as carried on the wire. The same shape is
/// returned, with `token` filled in when the caller omitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub priority: NotificationPriority,
    pub recipient_user_ids: Vec<i64>,
    pub subject: String,
    #[serde(default)]
    pub plain_text: Option<String>,
    #[serde(default)]
    pub html_text: Option<String>,
    /// Earliest processing time, epoch seconds UTC. Absent means now.
    #[serde(default)]
    pub not_before: Option<i64>,
}

/// Validates `notify` input and persists the notification together with one
/// delivery job per recipient, atomically.
pub struct IngressService {
    pool: SqlitePool,
    max_retry_attempts: i64,
}

impl IngressService {
    pub fn new(pool: SqlitePool, config: &NotifierConfig) -> Self {
        Self {
            pool,
            max_retry_attempts: config.job_max_retry_attempts as i64,
        }
    }

    /// Persist the submission. On success the notification and its jobs are
    /// committed in one transaction and the request is echoed back with its
    /// (possibly generated) token. Validation failures write nothing;
    /// any other failure rolls back and surfaces as `Unavailable`.
    pub async fn notify(
        &self,
        context: &str,
        mut request: NotificationRequest,
    ) -> AppResult<NotificationRequest> {
        self.validate(context, &request).await?;

        let token = match request.token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => Uuid::new_v4().simple().to_string(),
        };

        // A resubmission with a token we already accepted is replayed, not
        // re-enqueued.
        if let Some(existing) = NotificationRepository::find_by_token(&self.pool, context, &token)
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))?
        {
            tracing::info!(
                notification_id = existing.id,
                context,
                "duplicate token, returning prior submission"
            );
            request.token = Some(token);
            return Ok(request);
        }

        let not_before = match request.not_before {
            Some(epoch) => epoch_to_naive(epoch)?,
            None => Utc::now().naive_utc(),
        };

        let new = NewNotification {
            token: token.clone(),
            context: context.to_string(),
            priority: request.priority.as_i64(),
            subject: request.subject.clone(),
            plain_text: request.plain_text.clone().filter(|s| !s.is_empty()),
            html_text: request.html_text.clone().filter(|s| !s.is_empty()),
        };

        let recipients = dedup_preserving_order(&request.recipient_user_ids);
        let (notification, jobs) = NotificationRepository::create_with_jobs(
            &self.pool,
            new,
            &recipients,
            not_before,
            self.max_retry_attempts,
        )
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

        tracing::info!(
            notification_id = notification.id,
            context,
            jobs = jobs.len(),
            priority = notification.priority,
            "notification accepted"
        );

        request.token = Some(token);
        Ok(request)
    }

    async fn validate(&self, context: &str, request: &NotificationRequest) -> AppResult<()> {
        if context.is_empty() {
            return Err(AppError::InvalidNotification("context is empty".to_string()));
        }
        if request.subject.is_empty() {
            return Err(AppError::InvalidNotification("subject is empty".to_string()));
        }
        let has_plain = request.plain_text.as_deref().is_some_and(|s| !s.is_empty());
        let has_html = request.html_text.as_deref().is_some_and(|s| !s.is_empty());
        if !has_plain && !has_html {
            return Err(AppError::InvalidNotification(
                "at least one of plainText and htmlText is required".to_string(),
            ));
        }
        if request.recipient_user_ids.is_empty() {
            return Err(AppError::InvalidNotification(
                "recipientUserIds is empty".to_string(),
            ));
        }

        let recipients = dedup_preserving_order(&request.recipient_user_ids);
        let users = UserRepository::find_by_ids(&self.pool, &recipients)
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))?;
        let known: HashSet<i64> = users.iter().map(|u| u.id).collect();
        for id in &recipients {
            if !known.contains(id) {
                return Err(AppError::InvalidNotification(format!(
                    "unknown recipient user id {}",
                    id
                )));
            }
        }

        Ok(())
    }
}

fn dedup_preserving_order(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

fn epoch_to_naive(epoch: i64) -> AppResult<NaiveDateTime> {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| AppError::InvalidNotification("notBefore is out of range".to_string()))
}
