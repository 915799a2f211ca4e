use std::sync::Arc;

use serde::Serialize;
use storage::repository::TestSessionRepository;
use vision_core::model::{ResultOutcome, Session, UserId};
use vision_core::vision::{
    Astigmatism, ColorVision, ContrastSensitivity, TumblingE, VisionTest, VisualAcuity,
};

use crate::error::TestServiceError;

/// Latest session of one test type together with its interpretation.
#[derive(Serialize)]
#[serde(bound = "")]
struct Snapshot<'a, T: VisionTest> {
    session: &'a Session<T>,
    result: ResultOutcome<T::Report, T::LogEntry>,
}

/// Every test type side by side. Types the user never started are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllResults {
    pub visual_acuity: Option<serde_json::Value>,
    pub contrast_sensitivity: Option<serde_json::Value>,
    pub color_vision: Option<serde_json::Value>,
    pub astigmatism: Option<serde_json::Value>,
    pub tumbling_e: Option<serde_json::Value>,
}

impl AllResults {
    /// Number of test types with a session.
    #[must_use]
    pub fn taken(&self) -> usize {
        [
            &self.visual_acuity,
            &self.contrast_sensitivity,
            &self.color_vision,
            &self.astigmatism,
            &self.tumbling_e,
        ]
        .iter()
        .filter(|slot| slot.is_some())
        .count()
    }
}

/// Read-only view over all test types for one user.
#[derive(Clone)]
pub struct ResultsService {
    sessions: Arc<dyn TestSessionRepository>,
}

impl ResultsService {
    #[must_use]
    pub fn new(sessions: Arc<dyn TestSessionRepository>) -> Self {
        Self { sessions }
    }

    /// Latest session of every test type, each rendered as a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError` if any session cannot be loaded or encoded.
    pub async fn all_results(&self, user_id: UserId) -> Result<AllResults, TestServiceError> {
        Ok(AllResults {
            visual_acuity: self.snapshot::<VisualAcuity>(user_id).await?,
            contrast_sensitivity: self.snapshot::<ContrastSensitivity>(user_id).await?,
            color_vision: self.snapshot::<ColorVision>(user_id).await?,
            astigmatism: self.snapshot::<Astigmatism>(user_id).await?,
            tumbling_e: self.snapshot::<TumblingE>(user_id).await?,
        })
    }

    async fn snapshot<T: VisionTest>(
        &self,
        user_id: UserId,
    ) -> Result<Option<serde_json::Value>, TestServiceError> {
        let Some(record) = self.sessions.latest_session(user_id, T::KIND).await? else {
            return Ok(None);
        };
        let session = record.into_session::<T>()?;
        let snapshot = Snapshot {
            result: session.result(),
            session: &session,
        };
        Ok(Some(serde_json::to_value(&snapshot)?))
    }
}
