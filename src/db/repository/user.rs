use sqlx::SqlitePool;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

/// Read-only access to the external user table.
pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Fetch every listed user. Callers compare the result against the input
    /// to detect unknown ids; duplicates in `ids` collapse to one row.
    pub async fn find_by_ids(pool: &SqlitePool, ids: &[i64]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, email, first_name, last_name, created_at \
             FROM users WHERE id IN ({}) ORDER BY id",
            placeholders
        );

        let mut query = sqlx::query_as::<_, User>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        query.fetch_all(pool).await.map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::{insert_user, test_pool};

    #[tokio::test]
    async fn find_by_ids_collapses_duplicates_and_skips_unknown() {
        let pool = test_pool().await;
        let alice = insert_user(&pool, "alice@example.com", "Alice", "Smith").await;
        let bob = insert_user(&pool, "bob@example.com", "Bob", "Jones").await;

        let users = UserRepository::find_by_ids(&pool, &[bob, alice, alice, 999_999])
            .await
            .unwrap();

        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![alice, bob]);
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_missing_user() {
        let pool = test_pool().await;
        assert!(UserRepository::find_by_id(&pool, 42)
            .await
            .unwrap()
            .is_none());
    }
}
