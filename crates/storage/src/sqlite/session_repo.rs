use sqlx::{Row, SqliteConnection};
use vision_core::model::{SessionId, TestKind, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_log_row, map_session_row};
use crate::repository::{LogRow, SessionRecord, StorageError, TestSessionRepository, ser};

fn db(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

const SESSION_COLUMNS: &str = r"
    id, user_id, kind, active_eye, current_step,
    left_eye, right_eye, revision, created_at, updated_at
";

async fn insert_logs(
    conn: &mut SqliteConnection,
    session_id: i64,
    logs: &[LogRow],
    first_seq: usize,
) -> Result<(), StorageError> {
    for (offset, log) in logs.iter().enumerate() {
        let seq = i64::try_from(first_seq + offset)
            .map_err(|_| StorageError::Serialization("log seq overflow".into()))?;
        sqlx::query(
            r"
                INSERT INTO test_session_logs (session_id, seq, step, eye, recorded_at, entry)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(session_id)
        .bind(seq)
        .bind(i64::from(log.step))
        .bind(log.eye.as_str())
        .bind(log.recorded_at)
        .bind(log.entry.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db)?;
    }
    Ok(())
}

impl SqliteRepository {
    async fn load_logs(&self, session_id: SessionId) -> Result<Vec<LogRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT step, eye, recorded_at, entry
                FROM test_session_logs
                WHERE session_id = ?1
                ORDER BY seq ASC
            ",
        )
        .bind(id_i64("session_id", session_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_log_row).collect()
    }

    async fn with_logs(&self, mut record: SessionRecord) -> Result<SessionRecord, StorageError> {
        if let Some(id) = record.id {
            record.logs = self.load_logs(id).await?;
        }
        Ok(record)
    }
}

#[async_trait::async_trait]
impl TestSessionRepository for SqliteRepository {
    async fn insert_session(&self, record: &SessionRecord) -> Result<SessionId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query(
            r"
                INSERT INTO test_sessions (
                    user_id, kind, active_eye, current_step,
                    left_eye, right_eye, revision, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(id_i64("user_id", record.user_id.value())?)
        .bind(record.kind.as_str())
        .bind(record.active_eye.as_str())
        .bind(i64::from(record.current_step))
        .bind(record.left_eye.to_string())
        .bind(record.right_eye.to_string())
        .bind(id_i64("revision", record.revision)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        let session_id = res.last_insert_rowid();
        insert_logs(&mut tx, session_id, &record.logs, 0).await?;
        tx.commit().await.map_err(db)?;

        super::mapping::session_id_from_i64(session_id)
    }

    async fn update_session(&self, record: &SessionRecord) -> Result<u64, StorageError> {
        let id = record.id.ok_or(StorageError::NotFound)?;
        let session_id = id_i64("session_id", id.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query(
            r"
                UPDATE test_sessions
                SET active_eye = ?1,
                    current_step = ?2,
                    left_eye = ?3,
                    right_eye = ?4,
                    updated_at = ?5,
                    revision = revision + 1
                WHERE id = ?6 AND revision = ?7
            ",
        )
        .bind(record.active_eye.as_str())
        .bind(i64::from(record.current_step))
        .bind(record.left_eye.to_string())
        .bind(record.right_eye.to_string())
        .bind(record.updated_at)
        .bind(session_id)
        .bind(id_i64("revision", record.revision)?)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM test_sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db)?
                .is_some();
            return Err(if exists {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        let stored: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM test_session_logs WHERE session_id = ?1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db)?
                .try_get("n")
                .map_err(ser)?;
        let stored = usize::try_from(stored).map_err(ser)?;
        let Some(new_logs) = record.logs.get(stored..) else {
            return Err(StorageError::Conflict);
        };

        insert_logs(&mut tx, session_id, new_logs, stored).await?;
        tx.commit().await.map_err(db)?;

        Ok(record.revision + 1)
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM test_sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("session_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;

        self.with_logs(map_session_row(&row)?).await
    }

    async fn latest_session(
        &self,
        user_id: UserId,
        kind: TestKind,
    ) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.list_sessions(user_id, kind, 1).await?.into_iter().next())
    }

    async fn list_sessions(
        &self,
        user_id: UserId,
        kind: TestKind,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let sql = format!(
            r"
                SELECT {SESSION_COLUMNS}
                FROM test_sessions
                WHERE user_id = ?1 AND kind = ?2
                ORDER BY created_at DESC, id DESC
                LIMIT ?3
            "
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(kind.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.with_logs(map_session_row(row)?).await?);
        }
        Ok(records)
    }
}
