//! Odd-one-out color grid staircase.
//!
//! Step `n` shows an `(n + 1) x (n + 1)` grid in which one cell has a
//! different color, rendered at a lower opacity as the step rises. The
//! client sends back the grid it was shown and the index it picked; the
//! answer is correct when that cell is the odd one.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::{EyeState, VisionTest, same_score};
use crate::error::SessionError;
use crate::model::TestKind;

/// Grid cell colors: red, green, blue, yellow, magenta, cyan, orange, purple, pink.
pub const PALETTE: [&str; 9] = [
    "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF", "#FFA500", "#800080",
    "#FFC0CB",
];

/// Opacity of the grid, indexed by `step - 1`.
pub const OPACITY_LEVELS: [f64; 5] = [1.0, 0.8, 0.6, 0.4, 0.2];

const HARDEST_STEP: u32 = 5;
const MAX_INCORRECT_AT_LEVEL: usize = 3;

#[must_use]
pub fn opacity_for_step(step: u32) -> f64 {
    let index = step.saturating_sub(1) as usize;
    OPACITY_LEVELS[index.min(OPACITY_LEVELS.len() - 1)]
}

#[must_use]
pub fn grid_size_for_step(step: u32) -> u32 {
    step.clamp(1, HARDEST_STEP) + 1
}

/// Score credited for a correct answer at `step`.
#[must_use]
pub fn score_for_step(step: u32) -> u32 {
    100_u32.saturating_sub(step * 20)
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContrastSensitivity;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContrastEyeResult {
    /// Best score earned on a correct answer. Never decreases.
    pub discrimination_score: u32,
    pub finished: bool,
    pub correct_counter: u32,
    pub incorrect_counter: u32,
}

impl EyeState for ContrastEyeResult {
    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastLogEntry {
    pub colors: Vec<String>,
    pub different_color: String,
    pub opacity_level: f64,
    pub selected_index: usize,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastQuestion {
    pub colors: Vec<String>,
    pub opacity_level: f64,
    pub step: u32,
    pub grid_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastAnswer {
    pub selected_index: usize,
    /// The grid exactly as it was shown.
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastEyeScore {
    pub discrimination_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContrastVerdict {
    pub score: u32,
    pub status: &'static str,
    pub note: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContrastComparison {
    pub conclusion: &'static str,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastInterpretation {
    pub left_eye: ContrastVerdict,
    pub right_eye: ContrastVerdict,
    pub comparison: ContrastComparison,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastReport {
    pub left_eye: ContrastEyeScore,
    pub right_eye: ContrastEyeScore,
    pub interpretation: ContrastInterpretation,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

fn build_grid<R: Rng + ?Sized>(step: u32, rng: &mut R) -> Vec<String> {
    let grid = grid_size_for_step(step) as usize;
    let total = grid * grid;

    let base = PALETTE.choose(rng).copied().unwrap_or(PALETTE[0]);
    let others: Vec<&str> = PALETTE.into_iter().filter(|c| *c != base).collect();
    let different = others.choose(rng).copied().unwrap_or(PALETTE[1]);

    let mut colors = vec![base.to_owned(); total];
    let different_index = rng.random_range(0..total);
    colors[different_index] = different.to_owned();
    colors
}

/// The single cell color that differs from the rest, if the grid has one.
fn odd_color(colors: &[String]) -> Option<&str> {
    let mut unique = colors
        .iter()
        .filter(|color| colors.iter().filter(|other| other == color).count() == 1);
    let odd = unique.next()?;
    if unique.next().is_some() {
        return None;
    }
    Some(odd.as_str())
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

impl VisionTest for ContrastSensitivity {
    const KIND: TestKind = TestKind::ContrastSensitivity;
    const STEP_RANGE: std::ops::RangeInclusive<u32> = 1..=HARDEST_STEP;

    type EyeResult = ContrastEyeResult;
    type LogEntry = ContrastLogEntry;
    type Question = ContrastQuestion;
    type Answer = ContrastAnswer;
    type Report = ContrastReport;

    fn question<R: Rng + ?Sized>(step: u32, rng: &mut R) -> Option<ContrastQuestion> {
        Some(ContrastQuestion {
            colors: build_grid(step, rng),
            opacity_level: opacity_for_step(step),
            step,
            grid_size: grid_size_for_step(step),
        })
    }

    fn grade(step: u32, answer: ContrastAnswer) -> Result<ContrastLogEntry, SessionError> {
        let grid = grid_size_for_step(step) as usize;
        if answer.colors.len() != grid * grid {
            return Err(SessionError::InvalidAnswer(format!(
                "expected a {grid}x{grid} grid, got {} cells",
                answer.colors.len()
            )));
        }
        let Some(selected) = answer.colors.get(answer.selected_index) else {
            return Err(SessionError::InvalidAnswer(format!(
                "selected index {} is outside the grid",
                answer.selected_index
            )));
        };
        let Some(different_color) = odd_color(&answer.colors) else {
            return Err(SessionError::InvalidAnswer(
                "grid does not contain exactly one different cell".into(),
            ));
        };

        Ok(ContrastLogEntry {
            correct: selected == different_color,
            different_color: different_color.to_owned(),
            opacity_level: opacity_for_step(step),
            selected_index: answer.selected_index,
            colors: answer.colors,
        })
    }

    fn is_correct(entry: &ContrastLogEntry) -> bool {
        entry.correct
    }

    fn advance(
        step: u32,
        result: &mut ContrastEyeResult,
        latest: &ContrastLogEntry,
        history: &[&ContrastLogEntry],
    ) -> u32 {
        let mut next = step;

        if latest.correct {
            result.correct_counter += 1;
            result.discrimination_score = result.discrimination_score.max(score_for_step(step));
            if step < HARDEST_STEP {
                next = step + 1;
            } else {
                result.finished = true;
            }
        } else {
            result.incorrect_counter += 1;
            if step > 1 {
                next = step - 1;
            } else {
                result.finished = true;
            }
        }

        let incorrect_at_level = history
            .iter()
            .filter(|entry| !entry.correct && same_score(entry.opacity_level, latest.opacity_level))
            .count();
        if incorrect_at_level >= MAX_INCORRECT_AT_LEVEL {
            result.finished = true;
        }

        next
    }

    fn report(left: &ContrastEyeResult, right: &ContrastEyeResult) -> ContrastReport {
        ContrastReport {
            left_eye: ContrastEyeScore {
                discrimination_score: left.discrimination_score,
            },
            right_eye: ContrastEyeScore {
                discrimination_score: right.discrimination_score,
            },
            interpretation: interpret(left.discrimination_score, right.discrimination_score),
        }
    }
}

//
// ─── INTERPRETATION ────────────────────────────────────────────────────────────
//

fn verdict(score: u32) -> ContrastVerdict {
    ContrastVerdict {
        score,
        status: if score >= 60 { "Normal" } else { "Impaired" },
        note: match score {
            80.. => "Excellent",
            60..=79 => "Moderate",
            _ => "Significant impairment",
        },
    }
}

#[must_use]
pub fn interpret(left: u32, right: u32) -> ContrastInterpretation {
    ContrastInterpretation {
        left_eye: verdict(left),
        right_eye: verdict(right),
        comparison: ContrastComparison {
            conclusion: if left == right {
                "Equal discrimination"
            } else {
                "Difference between eyes"
            },
            recommendation: "Consult specialist if scores below 60%",
        },
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Eye, QuestionOutcome, Session, UserId};
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn grid_for(step: u32, odd_at: usize) -> Vec<String> {
        let n = grid_size_for_step(step) as usize;
        let mut colors = vec!["#FF0000".to_string(); n * n];
        colors[odd_at] = "#0000FF".to_string();
        colors
    }

    fn answer(session: &mut Session<ContrastSensitivity>, correct: bool) {
        let step = session.current_step();
        let colors = grid_for(step, 1);
        let selected_index = if correct { 1 } else { 0 };
        session
            .submit(
                ContrastAnswer {
                    selected_index,
                    colors,
                },
                fixed_now(),
            )
            .unwrap();
    }

    #[test]
    fn generated_grid_has_one_odd_cell() {
        let mut rng = StdRng::seed_from_u64(3);
        for step in 1..=5 {
            let q = ContrastSensitivity::question(step, &mut rng).unwrap();
            let n = (step + 1) as usize;
            assert_eq!(q.grid_size as usize, n);
            assert_eq!(q.colors.len(), n * n);
            assert!(odd_color(&q.colors).is_some());
            assert!(q.colors.iter().all(|c| PALETTE.contains(&c.as_str())));
            assert_eq!(q.opacity_level, OPACITY_LEVELS[(step - 1) as usize]);
        }
    }

    #[test]
    fn grading_rejects_malformed_grids() {
        let err = ContrastSensitivity::grade(
            2,
            ContrastAnswer {
                selected_index: 0,
                colors: grid_for(1, 0),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InvalidAnswer(_)));

        let err = ContrastSensitivity::grade(
            1,
            ContrastAnswer {
                selected_index: 9,
                colors: grid_for(1, 0),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InvalidAnswer(_)));

        let err = ContrastSensitivity::grade(
            1,
            ContrastAnswer {
                selected_index: 0,
                colors: vec!["#FF0000".into(); 4],
            },
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InvalidAnswer(_)));
    }

    #[test]
    fn correct_answers_climb_and_score_the_best_step() {
        let mut s: Session<ContrastSensitivity> = Session::new(UserId::new(1), Eye::Left, fixed_now());
        answer(&mut s, true);
        answer(&mut s, true);
        let left = s.eye_result(Eye::Left);
        assert_eq!(s.current_step(), 3);
        assert_eq!(left.correct_counter, 2);
        assert_eq!(left.discrimination_score, 80);
    }

    #[test]
    fn score_never_decreases() {
        let mut s: Session<ContrastSensitivity> = Session::new(UserId::new(1), Eye::Right, fixed_now());
        let mut last = 0;
        for round in 0..12 {
            answer(&mut s, round % 4 != 3);
            let score = s.eye_result(Eye::Right).discrimination_score;
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn correct_at_hardest_step_finishes() {
        let mut s: Session<ContrastSensitivity> = Session::new(UserId::new(1), Eye::Left, fixed_now());
        for _ in 0..5 {
            answer(&mut s, true);
        }
        let left = s.eye_result(Eye::Left);
        assert!(left.finished);
        assert_eq!(left.discrimination_score, 80);
        assert_eq!(s.current_step(), 5);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(s.question(&mut rng), QuestionOutcome::Finished { .. }));
    }

    #[test]
    fn wrong_at_first_step_finishes_with_zero() {
        let mut s: Session<ContrastSensitivity> = Session::new(UserId::new(1), Eye::Left, fixed_now());
        answer(&mut s, false);
        let left = s.eye_result(Eye::Left);
        assert!(left.finished);
        assert_eq!(left.incorrect_counter, 1);
        assert_eq!(left.discrimination_score, 0);
    }

    #[test]
    fn three_misses_at_one_opacity_finish_the_eye() {
        let mut result = ContrastEyeResult::default();
        let miss = ContrastLogEntry {
            colors: grid_for(3, 1),
            different_color: "#0000FF".into(),
            opacity_level: 0.6,
            selected_index: 0,
            correct: false,
        };
        let hit_elsewhere = ContrastLogEntry {
            opacity_level: 0.8,
            correct: true,
            selected_index: 1,
            ..miss.clone()
        };
        let next =
            ContrastSensitivity::advance(3, &mut result, &miss, &[&miss, &hit_elsewhere, &miss, &miss]);
        assert_eq!(next, 2);
        assert!(result.finished);
    }

    #[test]
    fn two_misses_at_one_opacity_keep_going() {
        let mut result = ContrastEyeResult::default();
        let miss = ContrastLogEntry {
            colors: grid_for(3, 1),
            different_color: "#0000FF".into(),
            opacity_level: 0.6,
            selected_index: 0,
            correct: false,
        };
        ContrastSensitivity::advance(3, &mut result, &miss, &[&miss, &miss]);
        assert!(!result.finished);
    }

    #[test]
    fn interpretation_buckets() {
        let i = interpret(80, 60);
        assert_eq!(i.left_eye.note, "Excellent");
        assert_eq!(i.left_eye.status, "Normal");
        assert_eq!(i.right_eye.note, "Moderate");
        assert_eq!(i.comparison.conclusion, "Difference between eyes");

        let i = interpret(40, 40);
        assert_eq!(i.left_eye.status, "Impaired");
        assert_eq!(i.left_eye.note, "Significant impairment");
        assert_eq!(i.comparison.conclusion, "Equal discrimination");
    }
}
