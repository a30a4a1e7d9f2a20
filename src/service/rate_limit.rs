use sqlx::SqlitePool;

use crate::error::{AppError, Result};

/// Fixed-window request counter backed by the database, so the limit holds
/// across server instances. Keys are caller-chosen, e.g. `login:{email}`.
pub struct RateLimitService {
    pool: SqlitePool,
}

impl RateLimitService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Counts one hit against `key`. Errors with `RateLimited` once the
    /// window's count exceeds `limit`. The increment is a single atomic
    /// upsert; a new window resets the count.
    pub async fn hit(&self, key: &str, limit: i64, window_seconds: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let window_start = now - now % window_seconds;

        sqlx::query(
            r#"
            INSERT INTO rate_limits (key, window_start, count)
            VALUES (?, ?, 1)
            ON CONFLICT(key) DO UPDATE SET
                count = CASE WHEN window_start = excluded.window_start
                    THEN count + 1 ELSE 1 END,
                window_start = excluded.window_start
            "#
        )
        .bind(key)
        .bind(window_start)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count FROM rate_limits WHERE key = ? AND window_start = ?"
        )
        .bind(key)
        .bind(window_start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .unwrap_or(0);

        if count > limit {
            tracing::warn!(key = %key, count, "rate limit exceeded");
            return Err(AppError::RateLimited(
                "Too many attempts, try again later".to_string(),
            ));
        }

        Ok(())
    }

    /// Clears a key, e.g. after a successful login.
    pub async fn reset(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM rate_limits WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
