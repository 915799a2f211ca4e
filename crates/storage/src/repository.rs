use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use vision_core::model::{Eye, EyePair, LogRecord, Session, SessionId, TestKind, UserId};
use vision_core::vision::VisionTest;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// One persisted log row. The test-specific entry is kept as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub step: u32,
    pub eye: Eye,
    pub recorded_at: DateTime<Utc>,
    pub entry: serde_json::Value,
}

/// Persisted shape for a test session of any kind.
///
/// Eye records and log entries are stored as JSON so one table serves all
/// five test types. `into_session` checks the kind before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: Option<SessionId>,
    pub user_id: UserId,
    pub kind: TestKind,
    pub active_eye: Eye,
    pub current_step: u32,
    pub left_eye: serde_json::Value,
    pub right_eye: serde_json::Value,
    pub logs: Vec<LogRow>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Erase a typed session into its persisted shape.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if an eye record or log entry
    /// cannot be encoded.
    pub fn from_session<T: VisionTest>(session: &Session<T>) -> Result<Self, StorageError> {
        let logs = session
            .logs()
            .iter()
            .map(|log| {
                Ok(LogRow {
                    step: log.step,
                    eye: log.eye,
                    recorded_at: log.recorded_at,
                    entry: serde_json::to_value(&log.entry).map_err(ser)?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(Self {
            id: session.id(),
            user_id: session.user_id(),
            kind: T::KIND,
            active_eye: session.active_eye(),
            current_step: session.current_step(),
            left_eye: serde_json::to_value(session.eyes().left()).map_err(ser)?,
            right_eye: serde_json::to_value(session.eyes().right()).map_err(ser)?,
            logs,
            revision: session.revision(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        })
    }

    /// Decode the record back into a typed session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the record belongs to another
    /// test kind, has no id, or holds JSON that does not match `T`.
    pub fn into_session<T: VisionTest>(self) -> Result<Session<T>, StorageError> {
        if self.kind != T::KIND {
            return Err(StorageError::Serialization(format!(
                "expected {} session, found {}",
                T::KIND,
                self.kind
            )));
        }
        let id = self
            .id
            .ok_or_else(|| StorageError::Serialization("session record without id".into()))?;

        let left: T::EyeResult = serde_json::from_value(self.left_eye).map_err(ser)?;
        let right: T::EyeResult = serde_json::from_value(self.right_eye).map_err(ser)?;
        let logs = self
            .logs
            .into_iter()
            .map(|row| {
                let entry: T::LogEntry = serde_json::from_value(row.entry).map_err(ser)?;
                Ok(LogRecord::new(row.step, row.eye, row.recorded_at, entry))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        Session::from_persisted(
            id,
            self.user_id,
            self.active_eye,
            self.current_step,
            EyePair::new(left, right),
            logs,
            self.revision,
            self.created_at,
            self.updated_at,
        )
        .map_err(ser)
    }
}

/// Repository contract for test sessions.
#[async_trait]
pub trait TestSessionRepository: Send + Sync {
    /// Store a new session and its logs. The record's `id` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn insert_session(&self, record: &SessionRecord) -> Result<SessionId, StorageError>;

    /// Save a loaded session back and return the new revision.
    ///
    /// Only log rows beyond those already stored are written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is missing and
    /// `StorageError::Conflict` if it was saved since `record.revision` was read.
    async fn update_session(&self, record: &SessionRecord) -> Result<u64, StorageError>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError>;

    /// Most recently created session of `kind` for the user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn latest_session(
        &self,
        user_id: UserId,
        kind: TestKind,
    ) -> Result<Option<SessionRecord>, StorageError>;

    /// Sessions of `kind` for the user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_sessions(
        &self,
        user_id: UserId,
        kind: TestKind,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, StorageError>;
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    sessions: HashMap<SessionId, SessionRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn newest_first(records: &mut [SessionRecord]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }
}

#[async_trait]
impl TestSessionRepository for InMemoryRepository {
    async fn insert_session(&self, record: &SessionRecord) -> Result<SessionId, StorageError> {
        let mut guard = self.lock()?;
        guard.next_id += 1;
        let id = SessionId::new(guard.next_id);
        let mut stored = record.clone();
        stored.id = Some(id);
        guard.sessions.insert(id, stored);
        Ok(id)
    }

    async fn update_session(&self, record: &SessionRecord) -> Result<u64, StorageError> {
        let id = record.id.ok_or(StorageError::NotFound)?;
        let mut guard = self.lock()?;
        let stored = guard.sessions.get_mut(&id).ok_or(StorageError::NotFound)?;
        if stored.revision != record.revision || record.logs.len() < stored.logs.len() {
            return Err(StorageError::Conflict);
        }

        let appended = record.logs[stored.logs.len()..].to_vec();
        let logs = std::mem::take(&mut stored.logs);
        *stored = SessionRecord {
            logs,
            revision: record.revision + 1,
            ..record.clone()
        };
        stored.logs.extend(appended);
        Ok(stored.revision)
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        let guard = self.lock()?;
        guard.sessions.get(&id).cloned().ok_or(StorageError::NotFound)
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
        let guard = self.lock()?;
        let mut found: Vec<SessionRecord> = guard
            .sessions
            .values()
            .filter(|r| r.user_id == user_id && r.kind == kind)
            .cloned()
            .collect();
        drop(guard);
        Self::newest_first(&mut found);
        found.truncate(limit as usize);
        Ok(found)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn TestSessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let sessions: Arc<dyn TestSessionRepository> = Arc::new(InMemoryRepository::new());
        Self { sessions }
    }
}
