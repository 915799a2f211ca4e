//! Adaptive vision self-tests.
//!
//! Every test type is a zero-sized marker implementing [`VisionTest`]. The
//! generic [`Session`](crate::model::Session) document drives the shared
//! start / question / answer / result lifecycle; the trait supplies the
//! per-test pieces:
//!
//! - a question generator for the current step,
//! - grading of a submitted answer into a log entry,
//! - the staircase rule that moves the step and finishes an eye,
//! - the result interpreter over both finished eyes.

use std::fmt::Debug;
use std::ops::RangeInclusive;

use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SessionError;
use crate::model::TestKind;

pub mod acuity;
pub mod astigmatism;
pub mod color;
pub mod contrast;
pub mod tumbling_e;

pub use acuity::VisualAcuity;
pub use astigmatism::Astigmatism;
pub use color::ColorVision;
pub use contrast::ContrastSensitivity;
pub use tumbling_e::TumblingE;

/// Per-eye record state shared by every test type.
pub trait EyeState {
    /// Terminal flag. Once true it never goes back to false.
    fn is_finished(&self) -> bool;
}

/// A single self-test type.
pub trait VisionTest: Debug + Clone + Copy + Default + PartialEq + Send + Sync + 'static {
    const KIND: TestKind;

    /// Valid values of `current_step`. Transitions are clamped into it.
    const STEP_RANGE: RangeInclusive<u32>;

    type EyeResult: EyeState
        + Debug
        + Clone
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync;
    type LogEntry: Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync;
    type Question: Debug + Clone + PartialEq + Serialize + Send;
    type Answer: Debug + Send;
    type Report: Debug + Clone + PartialEq + Serialize + Send;

    /// Builds the question shown at `step`, or `None` when the step has no question.
    fn question<R: Rng + ?Sized>(step: u32, rng: &mut R) -> Option<Self::Question>;

    /// Grades an answer given at `step` into the log entry that records it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the answer cannot be graded at this step.
    fn grade(step: u32, answer: Self::Answer) -> Result<Self::LogEntry, SessionError>;

    fn is_correct(entry: &Self::LogEntry) -> bool;

    /// Applies the staircase rule for one graded answer and returns the next step.
    ///
    /// `history` holds every log entry of the active eye in order, `latest`
    /// included as its last element.
    fn advance(
        step: u32,
        result: &mut Self::EyeResult,
        latest: &Self::LogEntry,
        history: &[&Self::LogEntry],
    ) -> u32;

    /// Interprets the per-eye records.
    fn report(left: &Self::EyeResult, right: &Self::EyeResult) -> Self::Report;

    /// Whether a report is produced before both eyes are finished.
    fn always_reports() -> bool {
        false
    }
}

/// Clamps `step` into `T::STEP_RANGE`.
#[must_use]
pub fn clamp_step<T: VisionTest>(step: u32) -> u32 {
    step.clamp(*T::STEP_RANGE.start(), *T::STEP_RANGE.end())
}

/// Exact-score comparison for interpreter labels that hinge on equality.
pub(crate) fn same_score(a: f64, b: f64) -> bool {
    (a - b).abs() < f64::EPSILON
}
