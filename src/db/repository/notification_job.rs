use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;

use crate::db::models::NotificationJob;
use crate::error::{AppError, AppResult};

/// Repository for the delivery job table.
///
/// Claiming uses an atomic single-statement UPDATE with a subselect:
/// `UPDATE ... WHERE id = (SELECT id FROM ... LIMIT 1) RETURNING ...`.
/// The statement locks the row, writes the owner, and returns it in one
/// step, so a job is visible to at most one claimant across the fleet.
pub struct NotificationJobRepository;

impl NotificationJobRepository {
    /// Claim the highest-priority eligible job for `owner`, or `None` when
    /// nothing is due.
    ///
    /// Eligible means unclaimed, non-terminal, and past `not_before`.
    /// Ordering is `(priority ASC, created_at ASC, id ASC)` so
    /// higher-priority older jobs win.
    pub async fn claim_next(
        pool: &SqlitePool,
        owner: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<NotificationJob>> {
        let row = sqlx::query_as::<_, NotificationJob>(
            r#"
            UPDATE notification_jobs
            SET owner = ?1, start_at = ?2
            WHERE id = (
                SELECT id FROM notification_jobs
                WHERE owner IS NULL
                  AND start_at IS NULL
                  AND end_at IS NULL
                  AND not_before <= ?2
                ORDER BY priority ASC, created_at ASC, id ASC
                LIMIT 1
            )
            AND owner IS NULL
            RETURNING
                id, notification_id, recipient_id, priority, created_at,
                not_before, retries_remaining, owner, start_at, end_at, successful
            "#,
        )
        .bind(owner)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Mark a claimed job terminal. Returns `false` when the row is no
    /// longer owned by `owner` (another claimant holds it, or it was already
    /// finalized), in which case nothing was written.
    pub async fn finalize(
        pool: &SqlitePool,
        job_id: i64,
        owner: &str,
        successful: bool,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE notification_jobs
            SET end_at = ?, successful = ?
            WHERE id = ? AND owner = ? AND end_at IS NULL
            "#,
        )
        .bind(now)
        .bind(successful)
        .bind(job_id)
        .bind(owner)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert the retry successor for a failed job: same notification,
    /// recipient, and priority, one fewer retry, delayed `not_before`. The
    /// failed row itself is never mutated.
    pub async fn insert_successor(
        pool: &SqlitePool,
        failed: &NotificationJob,
        not_before: NaiveDateTime,
    ) -> AppResult<NotificationJob> {
        let now = Utc::now().naive_utc();
        let row = sqlx::query_as::<_, NotificationJob>(
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
        .bind(failed.notification_id)
        .bind(failed.recipient_id)
        .bind(failed.priority)
        .bind(now)
        .bind(not_before)
        .bind(failed.retries_remaining - 1)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    #[allow(dead_code)]
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<NotificationJob>> {
        let row = sqlx::query_as::<_, NotificationJob>(
            r#"
            SELECT
                id, notification_id, recipient_id, priority, created_at,
                not_before, retries_remaining, owner, start_at, end_at, successful
            FROM notification_jobs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// All jobs spawned for one notification, retry successors included.
    #[allow(dead_code)]
    pub async fn list_for_notification(
        pool: &SqlitePool,
        notification_id: i64,
    ) -> AppResult<Vec<NotificationJob>> {
        let rows = sqlx::query_as::<_, NotificationJob>(
            r#"
            SELECT
                id, notification_id, recipient_id, priority, created_at,
                not_before, retries_remaining, owner, start_at, end_at, successful
            FROM notification_jobs
            WHERE notification_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(notification_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
