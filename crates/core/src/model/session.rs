use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{Eye, EyePair, Progress, SessionId, UserId};
use crate::vision::{EyeState, VisionTest, clamp_step};

//
// ─── LOG RECORD ────────────────────────────────────────────────────────────────
//

/// One accepted answer. Logs are append-only and survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord<E> {
    pub step: u32,
    pub eye: Eye,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: E,
}

impl<E> LogRecord<E> {
    #[must_use]
    pub fn new(step: u32, eye: Eye, recorded_at: DateTime<Utc>, entry: E) -> Self {
        Self {
            step,
            eye,
            recorded_at,
            entry,
        }
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// What `Session::question` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum QuestionOutcome<Q> {
    /// The active eye is done, or there is no question left at this step.
    Finished { eye: Eye },
    Next {
        #[serde(rename = "currentStep")]
        step: u32,
        question: Q,
    },
}

/// Result of submitting one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Submission {
    /// The answer was logged and the staircase moved.
    #[serde(rename_all = "camelCase")]
    Recorded {
        eye: Eye,
        correct: bool,
        eye_finished: bool,
        next_step: u32,
    },
    /// The active eye was already finished; nothing changed.
    EyeAlreadyFinished { eye: Eye },
}

impl Submission {
    #[must_use]
    pub fn eye_finished(&self) -> bool {
        match self {
            Submission::Recorded { eye_finished, .. } => *eye_finished,
            Submission::EyeAlreadyFinished { .. } => true,
        }
    }
}

/// Result lookup: either the interpreted report with the answers behind it,
/// or how far along both eyes are.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ResultOutcome<R, L> {
    Pending { progress: Progress },
    Ready { report: R, logs: Vec<LogRecord<L>> },
}

impl<R, L> ResultOutcome<R, L> {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, ResultOutcome::Ready { .. })
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// A user's attempt at one test type.
///
/// The document is loaded, moved through exactly one transition and saved
/// back whole. `revision` is bumped by the store on every save.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct Session<T: VisionTest> {
    id: Option<SessionId>,
    user_id: UserId,
    active_eye: Eye,
    current_step: u32,
    eyes: EyePair<T::EyeResult>,
    logs: Vec<LogRecord<T::LogEntry>>,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<T: VisionTest> Session<T> {
    /// Fresh session: step 1, both eyes untouched, no logs.
    #[must_use]
    pub fn new(user_id: UserId, active_eye: Eye, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id,
            active_eye,
            current_step: clamp_step::<T>(1),
            eyes: EyePair::default(),
            logs: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a session from storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::StepOutOfRange` if the stored step is not valid for `T`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        active_eye: Eye,
        current_step: u32,
        eyes: EyePair<T::EyeResult>,
        logs: Vec<LogRecord<T::LogEntry>>,
        revision: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if !T::STEP_RANGE.contains(&current_step) {
            return Err(SessionError::StepOutOfRange {
                step: current_step,
                min: *T::STEP_RANGE.start(),
                max: *T::STEP_RANGE.end(),
            });
        }
        Ok(Self {
            id: Some(id),
            user_id,
            active_eye,
            current_step,
            eyes,
            logs,
            revision,
            created_at,
            updated_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn active_eye(&self) -> Eye {
        self.active_eye
    }

    #[must_use]
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    #[must_use]
    pub fn eyes(&self) -> &EyePair<T::EyeResult> {
        &self.eyes
    }

    #[must_use]
    pub fn eye_result(&self, eye: Eye) -> &T::EyeResult {
        self.eyes.get(eye)
    }

    #[must_use]
    pub fn logs(&self) -> &[LogRecord<T::LogEntry>] {
        &self.logs
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Record the storage id assigned on first insert.
    pub fn assign_id(&mut self, id: SessionId) {
        self.id = Some(id);
    }

    /// Record the revision the store now holds.
    pub fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Log entries for one eye, oldest first.
    pub fn eye_logs(&self, eye: Eye) -> impl Iterator<Item = &T::LogEntry> {
        self.logs
            .iter()
            .filter(move |log| log.eye == eye)
            .map(|log| &log.entry)
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            left_done: self.eyes.left().is_finished(),
            right_done: self.eyes.right().is_finished(),
        }
    }

    /// Restart in place: step back to 1 and select `eye`.
    ///
    /// Eye records and logs are kept, so answers given before the restart
    /// still count toward log-based termination rules.
    pub fn restart(&mut self, eye: Eye, now: DateTime<Utc>) {
        self.active_eye = eye;
        self.current_step = clamp_step::<T>(1);
        self.updated_at = now;
    }

    /// Next question for the active eye.
    pub fn question<R: Rng + ?Sized>(&self, rng: &mut R) -> QuestionOutcome<T::Question> {
        let eye = self.active_eye;
        if self.eyes.get(eye).is_finished() {
            return QuestionOutcome::Finished { eye };
        }
        match T::question(self.current_step, rng) {
            Some(question) => QuestionOutcome::Next {
                step: self.current_step,
                question,
            },
            None => QuestionOutcome::Finished { eye },
        }
    }

    /// Apply one answer to the active eye.
    ///
    /// A finished eye is left untouched and `Submission::EyeAlreadyFinished`
    /// is returned. On error the session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the answer cannot be graded at the current step.
    pub fn submit(
        &mut self,
        answer: T::Answer,
        at: DateTime<Utc>,
    ) -> Result<Submission, SessionError> {
        let eye = self.active_eye;
        if self.eyes.get(eye).is_finished() {
            return Ok(Submission::EyeAlreadyFinished { eye });
        }

        let step = self.current_step;
        let entry = T::grade(step, answer)?;
        let correct = T::is_correct(&entry);
        self.logs.push(LogRecord::new(step, eye, at, entry.clone()));

        let next = {
            let Self { logs, eyes, .. } = &mut *self;
            let history: Vec<&T::LogEntry> = logs
                .iter()
                .filter(|log| log.eye == eye)
                .map(|log| &log.entry)
                .collect();
            T::advance(step, eyes.get_mut(eye), &entry, &history)
        };

        self.current_step = clamp_step::<T>(next);
        self.updated_at = at;

        Ok(Submission::Recorded {
            eye,
            correct,
            eye_finished: self.eyes.get(eye).is_finished(),
            next_step: self.current_step,
        })
    }

    /// Interpret the stored eye records. Pure: repeated calls agree.
    ///
    /// A ready result carries every logged answer of both eyes, in order.
    #[must_use]
    pub fn result(&self) -> ResultOutcome<T::Report, T::LogEntry> {
        let progress = self.progress();
        if !progress.is_complete() && !T::always_reports() {
            return ResultOutcome::Pending { progress };
        }
        ResultOutcome::Ready {
            report: T::report(self.eyes.left(), self.eyes.right()),
            logs: self.logs.clone(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
