use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies the versioned schema.
///
/// Version 1 creates sessions, their append-only logs, and the lookup index
/// used for "latest session of a kind".
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS test_sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    kind TEXT NOT NULL,
                    active_eye TEXT NOT NULL CHECK (active_eye IN ('left', 'right')),
                    current_step INTEGER NOT NULL CHECK (current_step >= 0),
                    left_eye TEXT NOT NULL,
                    right_eye TEXT NOT NULL,
                    revision INTEGER NOT NULL CHECK (revision >= 0),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS test_session_logs (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL,
                    seq INTEGER NOT NULL CHECK (seq >= 0),
                    step INTEGER NOT NULL CHECK (step >= 0),
                    eye TEXT NOT NULL CHECK (eye IN ('left', 'right')),
                    recorded_at TEXT NOT NULL,
                    entry TEXT NOT NULL,
                    UNIQUE (session_id, seq),
                    FOREIGN KEY (session_id) REFERENCES test_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_test_sessions_user_kind_created
                    ON test_sessions (user_id, kind, created_at, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
