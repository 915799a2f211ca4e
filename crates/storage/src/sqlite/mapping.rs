use std::str::FromStr;

use sqlx::Row;
use vision_core::model::{Eye, SessionId, TestKind, UserId};

use crate::repository::{LogRow, SessionRecord, StorageError, ser};

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

fn parse_json(field: &'static str, raw: &str) -> Result<serde_json::Value, StorageError> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("invalid {field} json: {e}")))
}

/// Maps a `test_sessions` row. Logs are loaded separately.
pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let kind_str: String = row.try_get("kind").map_err(ser)?;
    let eye_str: String = row.try_get("active_eye").map_err(ser)?;
    let left_raw: String = row.try_get("left_eye").map_err(ser)?;
    let right_raw: String = row.try_get("right_eye").map_err(ser)?;

    Ok(SessionRecord {
        id: Some(session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?),
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        kind: TestKind::from_str(&kind_str).map_err(ser)?,
        active_eye: Eye::from_str(&eye_str).map_err(ser)?,
        current_step: u32_from_i64(
            "current_step",
            row.try_get::<i64, _>("current_step").map_err(ser)?,
        )?,
        left_eye: parse_json("left_eye", &left_raw)?,
        right_eye: parse_json("right_eye", &right_raw)?,
        logs: Vec::new(),
        revision: i64_to_u64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_log_row(row: &sqlx::sqlite::SqliteRow) -> Result<LogRow, StorageError> {
    let eye_str: String = row.try_get("eye").map_err(ser)?;
    let entry_raw: String = row.try_get("entry").map_err(ser)?;

    Ok(LogRow {
        step: u32_from_i64("step", row.try_get::<i64, _>("step").map_err(ser)?)?,
        eye: Eye::from_str(&eye_str).map_err(ser)?,
        recorded_at: row.try_get("recorded_at").map_err(ser)?,
        entry: parse_json("entry", &entry_raw)?,
    })
}
