pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;

#[cfg(test)]
pub(crate) mod testutil {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;

    /// Fresh in-memory database with the real migrations applied.
    ///
    /// A single connection keeps the `:memory:` database alive for the
    /// whole pool.
    pub(crate) async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("failed to open in-memory database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations");

        pool
    }

    /// The user table belongs to the account system, so there is no
    /// repository write path; tests seed it directly.
    pub(crate) async fn insert_user(
        pool: &SqlitePool,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> i64 {
        sqlx::query(
            "INSERT INTO users (email, first_name, last_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(chrono::Utc::now().naive_utc())
        .execute(pool)
        .await
        .expect("failed to insert test user")
        .last_insert_rowid()
    }
}
