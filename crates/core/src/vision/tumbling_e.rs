//! Tumbling-E direction test.
//!
//! Each question shows an E pointing in a random direction at a size taken
//! from the step table. Difficulty does not adapt: an eye finishes after
//! seven answers whatever their accuracy.
//!
//! The client reports both the direction it showed and the one selected,
//! and correctness is their equality. The server keeps no record of the
//! direction it issued, so a client can report any outcome.

use std::fmt;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::{EyeState, VisionTest};
use crate::error::SessionError;
use crate::model::TestKind;

pub const INSTRUCTION: &str = "Look at the letter E and tell in which direction it is pointing.";

/// Optotype sizes for steps 1..=7.
pub const SIZE_TABLE: [&str; 7] = ["100px", "75px", "50px", "40px", "30px", "20px", "15px"];
const SMALLEST_SIZE: &str = "15px";

const ATTEMPTS_PER_EYE: u32 = 7;
const GOOD_ACCURACY: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Direction::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| SessionError::InvalidAnswer(format!("unknown direction {s:?}")))
    }
}

#[must_use]
pub fn size_for_step(step: u32) -> &'static str {
    step.checked_sub(1)
        .and_then(|index| SIZE_TABLE.get(index as usize))
        .copied()
        .unwrap_or(SMALLEST_SIZE)
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TumblingE;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TumblingEyeResult {
    pub correct_counter: u32,
    pub incorrect_counter: u32,
    pub finished: bool,
}

impl TumblingEyeResult {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.correct_counter + self.incorrect_counter
    }

    /// Percentage of correct answers, 0 when nothing was answered.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.attempts();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.correct_counter) / f64::from(total) * 100.0
    }
}

impl EyeState for TumblingEyeResult {
    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TumblingLogEntry {
    pub shown_direction: Direction,
    pub selected_direction: Direction,
    pub correct: bool,
    pub image_shown: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TumblingQuestion {
    pub instruction: &'static str,
    pub direction: Direction,
    pub size: &'static str,
    pub options: [Direction; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TumblingAnswer {
    pub shown_direction: Direction,
    pub selected_direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EyeEvaluation {
    pub correct: u32,
    pub incorrect: u32,
    /// One decimal place with a percent sign, e.g. `57.1%`.
    pub accuracy: String,
    pub status: &'static str,
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TumblingReport {
    pub completed: bool,
    pub left_eye: EyeEvaluation,
    pub right_eye: EyeEvaluation,
    pub interpretation: String,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

impl VisionTest for TumblingE {
    const KIND: TestKind = TestKind::TumblingE;
    // One step past the table: the last answer of an eye still advances.
    const STEP_RANGE: std::ops::RangeInclusive<u32> = 1..=ATTEMPTS_PER_EYE + 1;

    type EyeResult = TumblingEyeResult;
    type LogEntry = TumblingLogEntry;
    type Question = TumblingQuestion;
    type Answer = TumblingAnswer;
    type Report = TumblingReport;

    fn question<R: Rng + ?Sized>(step: u32, rng: &mut R) -> Option<TumblingQuestion> {
        let direction = Direction::ALL.choose(rng).copied().unwrap_or(Direction::Up);
        Some(TumblingQuestion {
            instruction: INSTRUCTION,
            direction,
            size: size_for_step(step),
            options: Direction::ALL,
        })
    }

    fn grade(_step: u32, answer: TumblingAnswer) -> Result<TumblingLogEntry, SessionError> {
        Ok(TumblingLogEntry {
            shown_direction: answer.shown_direction,
            selected_direction: answer.selected_direction,
            correct: answer.shown_direction == answer.selected_direction,
            image_shown: format!("e_{}.svg", answer.shown_direction),
        })
    }

    fn is_correct(entry: &TumblingLogEntry) -> bool {
        entry.correct
    }

    fn advance(
        step: u32,
        result: &mut TumblingEyeResult,
        latest: &TumblingLogEntry,
        _history: &[&TumblingLogEntry],
    ) -> u32 {
        if latest.correct {
            result.correct_counter += 1;
        } else {
            result.incorrect_counter += 1;
        }
        if result.attempts() >= ATTEMPTS_PER_EYE {
            result.finished = true;
        }
        step + 1
    }

    fn report(left: &TumblingEyeResult, right: &TumblingEyeResult) -> TumblingReport {
        let left_eye = evaluate(left);
        let right_eye = evaluate(right);
        let interpretation = interpret(&left_eye, &right_eye);
        TumblingReport {
            completed: left.finished && right.finished,
            left_eye,
            right_eye,
            interpretation,
        }
    }

    fn always_reports() -> bool {
        true
    }
}

//
// ─── INTERPRETATION ────────────────────────────────────────────────────────────
//

#[must_use]
pub fn evaluate(result: &TumblingEyeResult) -> EyeEvaluation {
    let accuracy = result.accuracy();
    EyeEvaluation {
        correct: result.correct_counter,
        incorrect: result.incorrect_counter,
        accuracy: format!("{accuracy:.1}%"),
        status: if accuracy >= GOOD_ACCURACY {
            "Good"
        } else {
            "Needs Attention"
        },
        finished: result.finished,
    }
}

/// Names the eyes that need attention, or says both performed well.
#[must_use]
pub fn interpret(left: &EyeEvaluation, right: &EyeEvaluation) -> String {
    let concerns: Vec<&str> = [("Left Eye", left), ("Right Eye", right)]
        .into_iter()
        .filter(|(_, eval)| eval.status == "Needs Attention")
        .map(|(name, _)| name)
        .collect();

    if concerns.is_empty() {
        "Both eyes performed well.".to_owned()
    } else {
        format!("{} may need attention.", concerns.join(" and "))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
