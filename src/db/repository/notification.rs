use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;

use crate::db::models::{NewNotification, Notification, NotificationJob};
use crate::error::{AppError, AppResult};

/// Repository for notification rows and their atomic expansion into
/// per-recipient delivery jobs.
pub struct NotificationRepository;

impl NotificationRepository {
    /// Insert one notification, its recipient links, and one delivery job per
    /// recipient, all in a single transaction. Either everything commits or
    /// nothing is written.
    pub async fn create_with_jobs(
        pool: &SqlitePool,
        new: NewNotification,
        recipient_ids: &[i64],
        not_before: NaiveDateTime,
        retries_remaining: i64,
    ) -> AppResult<(Notification, Vec<NotificationJob>)> {
        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                token, context, priority, subject, plain_text, html_text, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, token, context, priority, subject, plain_text, html_text, created_at
            "#,
        )
        .bind(&new.token)
        .bind(&new.context)
        .bind(new.priority)
        .bind(&new.subject)
        .bind(&new.plain_text)
        .bind(&new.html_text)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let mut jobs = Vec::with_capacity(recipient_ids.len());
        for user_id in recipient_ids {
            sqlx::query("INSERT INTO notification_users (notification_id, user_id) VALUES (?, ?)")
                .bind(notification.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;

            let job = sqlx::query_as::<_, NotificationJob>(
                r#"
                INSERT INTO notification_jobs (
                    notification_id, recipient_id, priority, created_at,
                    not_before, retries_remaining
                ) VALUES (?, ?, ?, ?, ?, ?)
                RETURNING
                    id, notification_id, recipient_id, priority, created_at,
                    not_before, retries_remaining, owner, start_at, end_at, successful
                "#,
            )
            .bind(notification.id)
            .bind(user_id)
            .bind(new.priority)
            .bind(now)
            .bind(not_before)
            .bind(retries_remaining)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;

            jobs.push(job);
        }

        tx.commit().await.map_err(AppError::Database)?;

        Ok((notification, jobs))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, token, context, priority, subject, plain_text, html_text, created_at
            FROM notifications
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Look up a prior submission by its idempotency token.
    pub async fn find_by_token(
        pool: &SqlitePool,
        context: &str,
        token: &str,
    ) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, token, context, priority, subject, plain_text, html_text, created_at
            FROM notifications
            WHERE context = ? AND token = ?
            "#,
        )
        .bind(context)
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }
}
