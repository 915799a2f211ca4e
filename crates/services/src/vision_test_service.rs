use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use storage::repository::{SessionRecord, StorageError, TestSessionRepository};
use tracing::{debug, info, warn};
use vision_core::model::{Eye, QuestionOutcome, ResultOutcome, Session, Submission, UserId};
use vision_core::vision::VisionTest;

use crate::Clock;
use crate::error::TestServiceError;

/// Outcome of `submit_answer`: the transition and the session after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct AnswerReceipt<T: VisionTest> {
    pub session: Session<T>,
    pub eye_finished: bool,
    pub submission: Submission,
}

/// Drives the start / question / answer / result lifecycle of one test type.
///
/// Every call loads the user's latest session of `T`, applies one transition
/// and saves it back. Saves are guarded by the stored revision, so a
/// concurrent writer surfaces as `TestServiceError::Conflict`.
pub struct VisionTestService<T: VisionTest> {
    clock: Clock,
    sessions: Arc<dyn TestSessionRepository>,
    _test: PhantomData<fn() -> T>,
}

impl<T: VisionTest> Clone for VisionTestService<T> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock,
            sessions: Arc::clone(&self.sessions),
            _test: PhantomData,
        }
    }
}

impl<T: VisionTest> VisionTestService<T> {
    #[must_use]
    pub fn new(clock: Clock, sessions: Arc<dyn TestSessionRepository>) -> Self {
        Self {
            clock,
            sessions,
            _test: PhantomData,
        }
    }

    /// Start testing `eye`.
    ///
    /// Creates the user's first session, or restarts the latest one in place:
    /// step back to 1 with `eye` active, earlier answers kept.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError::Conflict` if the session changed while
    /// restarting, or `TestServiceError::Storage` on persistence failures.
    pub async fn start_test(
        &self,
        user_id: UserId,
        eye: Eye,
    ) -> Result<Session<T>, TestServiceError> {
        let Some(mut session) = self.find_latest(user_id).await? else {
            return self.create(user_id, eye).await;
        };

        session.restart(eye, self.clock.now());
        self.save(&mut session).await?;
        info!(
            test = %T::KIND,
            user = %user_id,
            eye = %eye,
            session = ?session.id(),
            "restarted test"
        );
        Ok(session)
    }

    /// Start a brand-new session, leaving earlier sessions as history.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError::Storage` if the session cannot be stored.
    pub async fn retake(&self, user_id: UserId, eye: Eye) -> Result<Session<T>, TestServiceError> {
        self.create(user_id, eye).await
    }

    /// Next question for the active eye of the latest session.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError::NotFound` if the user never started this test.
    pub async fn get_question(
        &self,
        user_id: UserId,
    ) -> Result<QuestionOutcome<T::Question>, TestServiceError> {
        let session = self.load_latest(user_id).await?;
        let mut rng = rand::rng();
        Ok(session.question(&mut rng))
    }

    /// Grade an answer for the active eye and persist the transition.
    ///
    /// Answers to an already finished eye are reported back without saving.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError::NotFound` if the user never started this test,
    /// `TestServiceError::Session` if the answer is invalid at the current step,
    /// and `TestServiceError::Conflict` if another answer was saved first.
    pub async fn submit_answer(
        &self,
        user_id: UserId,
        answer: T::Answer,
    ) -> Result<AnswerReceipt<T>, TestServiceError> {
        let mut session = self.load_latest(user_id).await?;
        let outcome = session.submit(answer, self.clock.now())?;

        match outcome {
            Submission::Recorded {
                eye,
                correct,
                eye_finished,
                next_step,
            } => {
                self.save(&mut session).await?;
                debug!(
                    test = %T::KIND,
                    user = %user_id,
                    eye = %eye,
                    correct,
                    next_step,
                    "answer recorded"
                );
                if eye_finished {
                    info!(test = %T::KIND, user = %user_id, eye = %eye, "eye finished");
                }
            }
            Submission::EyeAlreadyFinished { eye } => {
                debug!(test = %T::KIND, user = %user_id, eye = %eye, "answer ignored, eye finished");
            }
        }
        Ok(AnswerReceipt {
            session,
            eye_finished: outcome.eye_finished(),
            submission: outcome,
        })
    }

    /// Interpreted result of the latest session.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError::NotFound` if the user never started this test.
    pub async fn get_result(
        &self,
        user_id: UserId,
    ) -> Result<ResultOutcome<T::Report, T::LogEntry>, TestServiceError> {
        let session = self.load_latest(user_id).await?;
        Ok(session.result())
    }

    /// Past sessions of this test, newest first.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError` if sessions cannot be loaded or decoded.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Session<T>>, TestServiceError> {
        let records = self.sessions.list_sessions(user_id, T::KIND, limit).await?;
        records
            .into_iter()
            .map(|record| record.into_session::<T>().map_err(TestServiceError::from))
            .collect()
    }

    /// Latest session of this test, if any.
    ///
    /// # Errors
    ///
    /// Returns `TestServiceError` if the session cannot be loaded or decoded.
    pub async fn find_latest(&self, user_id: UserId) -> Result<Option<Session<T>>, TestServiceError> {
        let record = self.sessions.latest_session(user_id, T::KIND).await?;
        Ok(record.map(SessionRecord::into_session::<T>).transpose()?)
    }

    async fn load_latest(&self, user_id: UserId) -> Result<Session<T>, TestServiceError> {
        self.find_latest(user_id)
            .await?
            .ok_or(TestServiceError::NotFound {
                kind: T::KIND,
                user_id,
            })
    }

    async fn create(&self, user_id: UserId, eye: Eye) -> Result<Session<T>, TestServiceError> {
        let mut session = Session::<T>::new(user_id, eye, self.clock.now());
        let id = self
            .sessions
            .insert_session(&SessionRecord::from_session(&session)?)
            .await?;
        session.assign_id(id);
        info!(test = %T::KIND, user = %user_id, eye = %eye, session = %id, "started test");
        Ok(session)
    }

    async fn save(&self, session: &mut Session<T>) -> Result<(), TestServiceError> {
        let record = SessionRecord::from_session(session)?;
        let revision = match self.sessions.update_session(&record).await {
            Ok(revision) => revision,
            Err(StorageError::Conflict) => {
                warn!(
                    test = %T::KIND,
                    session = ?session.id(),
                    revision = record.revision,
                    "stale session revision"
                );
                return Err(TestServiceError::Conflict);
            }
            Err(err) => return Err(err.into()),
        };
        session.set_revision(revision);
        Ok(())
    }
}
