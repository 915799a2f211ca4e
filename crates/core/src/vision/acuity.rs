//! Letter-size staircase.
//!
//! Steps run 1..=7 and the letter size is `8 - step`, so step 7 shows the
//! smallest letter. A correct answer moves one step harder, a wrong one
//! one step easier. The eye finishes at either end of the staircase, after
//! three direction changes, or once the same size has been answered twice.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{EyeState, VisionTest, same_score};
use crate::error::SessionError;
use crate::model::TestKind;

/// Optotypes indexed by `size - 1`.
pub const LETTERS: [&str; 7] = ["E", "F", "P", "T", "O", "Z", "L"];

/// Fixed distractors offered next to the correct letter.
pub const DISTRACTORS: [&str; 3] = ["A", "B", "C"];

const HARDEST_STEP: u32 = 7;
const MAX_DIRECTION_CHANGES: u32 = 3;
const MAX_SAME_SIZE_ATTEMPTS: usize = 2;
const NORMAL_THRESHOLD: f64 = 0.7;

/// Letter size displayed at `step`.
#[must_use]
pub fn size_for_step(step: u32) -> u32 {
    8 - step.clamp(1, HARDEST_STEP)
}

/// The correct letter at `step`.
#[must_use]
pub fn letter_for_step(step: u32) -> &'static str {
    let index = (size_for_step(step) - 1) as usize;
    LETTERS[index]
}

/// Acuity score for the size an eye finished on.
#[must_use]
pub fn acuity_value(size: u32) -> f64 {
    f64::from(8_u32.saturating_sub(size)) / 10.0
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualAcuity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcuityEyeResult {
    pub value: f64,
    pub finished: bool,
    pub direction_change_counter: u32,
    /// Size reached when the eye finished on a correct answer at the hardest step.
    pub smallest_step_counter: u32,
}

impl AcuityEyeResult {
    fn finish_at(&mut self, size: u32) {
        self.finished = true;
        self.value = acuity_value(size);
    }
}

impl EyeState for AcuityEyeResult {
    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcuityLogEntry {
    pub size: u32,
    pub selected_option: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcuityQuestion {
    pub letter: String,
    pub size: u32,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcuityAnswer {
    pub selected_option: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EyeVerdict {
    pub score: f64,
    pub status: &'static str,
    pub note: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallVerdict {
    pub conclusion: &'static str,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcuityInterpretation {
    pub left_eye: EyeVerdict,
    pub right_eye: EyeVerdict,
    pub overall: OverallVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcuityReport {
    pub left_eye: f64,
    pub right_eye: f64,
    pub interpretation: AcuityInterpretation,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

impl VisionTest for VisualAcuity {
    const KIND: TestKind = TestKind::VisualAcuity;
    const STEP_RANGE: std::ops::RangeInclusive<u32> = 1..=HARDEST_STEP;

    type EyeResult = AcuityEyeResult;
    type LogEntry = AcuityLogEntry;
    type Question = AcuityQuestion;
    type Answer = AcuityAnswer;
    type Report = AcuityReport;

    fn question<R: Rng + ?Sized>(step: u32, rng: &mut R) -> Option<AcuityQuestion> {
        let letter = letter_for_step(step);
        let mut options: Vec<String> = std::iter::once(letter)
            .chain(DISTRACTORS)
            .map(str::to_owned)
            .collect();
        options.shuffle(rng);
        Some(AcuityQuestion {
            letter: letter.to_owned(),
            size: size_for_step(step),
            options,
        })
    }

    fn grade(step: u32, answer: AcuityAnswer) -> Result<AcuityLogEntry, SessionError> {
        let correct = answer.selected_option.trim() == letter_for_step(step);
        Ok(AcuityLogEntry {
            size: size_for_step(step),
            selected_option: answer.selected_option,
            correct,
        })
    }

    fn is_correct(entry: &AcuityLogEntry) -> bool {
        entry.correct
    }

    fn advance(
        step: u32,
        result: &mut AcuityEyeResult,
        latest: &AcuityLogEntry,
        history: &[&AcuityLogEntry],
    ) -> u32 {
        let size = latest.size;
        let mut next = step;

        if latest.correct {
            if step < HARDEST_STEP {
                next = step + 1;
            } else {
                result.finish_at(size);
                result.smallest_step_counter = size;
            }
        } else if step > 1 {
            next = step - 1;
            result.direction_change_counter += 1;
        } else {
            result.finish_at(size);
        }

        if result.direction_change_counter >= MAX_DIRECTION_CHANGES {
            result.finish_at(size);
        }

        let same_size_attempts = history.iter().filter(|entry| entry.size == size).count();
        if same_size_attempts >= MAX_SAME_SIZE_ATTEMPTS {
            result.finish_at(size);
        }

        next
    }

    fn report(left: &AcuityEyeResult, right: &AcuityEyeResult) -> AcuityReport {
        AcuityReport {
            left_eye: left.value,
            right_eye: right.value,
            interpretation: interpret(left.value, right.value),
        }
    }
}

//
// ─── INTERPRETATION ────────────────────────────────────────────────────────────
//

fn status_for(score: f64) -> &'static str {
    if score >= NORMAL_THRESHOLD {
        "Normal vision"
    } else {
        "Possible impairment"
    }
}

/// Clinical-style wording for both acuity scores.
///
/// The left-eye note depends on an exact 0.7 score while the right-eye note
/// is fixed. Clients rely on this wording, so it is reproduced as is.
#[must_use]
pub fn interpret(left: f64, right: f64) -> AcuityInterpretation {
    AcuityInterpretation {
        left_eye: EyeVerdict {
            score: left,
            status: status_for(left),
            note: if same_score(left, NORMAL_THRESHOLD) {
                "Excellent visual acuity"
            } else {
                "Mild reduction in acuity"
            },
        },
        right_eye: EyeVerdict {
            score: right,
            status: status_for(right),
            note: "Minor difficulty with smallest letters",
        },
        overall: OverallVerdict {
            conclusion: "Both eyes show normal visual acuity",
            recommendation: if same_score(left, right) {
                "No significant difference between eyes"
            } else {
                "Consider follow-up for right eye"
            },
        },
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Eye, ResultOutcome, Session, Submission, UserId};
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn session() -> Session<VisualAcuity> {
        Session::new(UserId::new(1), Eye::Left, fixed_now())
    }

    fn answer(session: &mut Session<VisualAcuity>, correct: bool) -> Submission {
        let selected = if correct {
            letter_for_step(session.current_step())
        } else {
            "B"
        };
        session
            .submit(
                AcuityAnswer {
                    selected_option: selected.to_owned(),
                },
                fixed_now(),
            )
            .unwrap()
    }

    #[test]
    fn sizes_and_letters_follow_the_step() {
        assert_eq!(size_for_step(1), 7);
        assert_eq!(size_for_step(7), 1);
        assert_eq!(letter_for_step(1), "L");
        assert_eq!(letter_for_step(7), "E");
    }

    #[test]
    fn question_offers_the_letter_and_three_distractors() {
        let mut rng = StdRng::seed_from_u64(42);
        let q = VisualAcuity::question(3, &mut rng).unwrap();
        assert_eq!(q.size, 5);
        assert_eq!(q.letter, "O");
        let mut options = q.options.clone();
        options.sort();
        assert_eq!(options, vec!["A", "B", "C", "O"]);
    }

    #[test]
    fn seven_correct_answers_finish_at_zero_point_seven() {
        let mut s = session();
        for expected_step in 1..=7 {
            assert_eq!(s.current_step(), expected_step);
            answer(&mut s, true);
        }
        let left = s.eye_result(Eye::Left);
        assert!(left.finished);
        assert_eq!(left.value, 0.7);
        assert_eq!(left.smallest_step_counter, 1);
        assert_eq!(s.current_step(), 7);
    }

    #[test]
    fn wrong_answer_at_first_step_finishes_immediately() {
        let mut s = session();
        let outcome = answer(&mut s, false);
        assert!(outcome.eye_finished());
        let left = s.eye_result(Eye::Left);
        assert_eq!(left.value, acuity_value(7));
        assert_eq!(s.current_step(), 1);
    }

    #[test]
    fn wrong_answer_steps_down_and_counts_direction_change() {
        let mut s = session();
        answer(&mut s, true);
        answer(&mut s, true);
        answer(&mut s, false);
        let left = s.eye_result(Eye::Left);
        assert_eq!(s.current_step(), 2);
        assert_eq!(left.direction_change_counter, 1);
        assert!(!left.finished);
    }

    #[test]
    fn revisiting_a_size_finishes_the_eye() {
        let mut s = session();
        answer(&mut s, true); // size 7 -> step 2
        answer(&mut s, true); // size 6 -> step 3
        answer(&mut s, false); // size 5 -> step 2
        let outcome = answer(&mut s, true); // size 6 again

        assert!(outcome.eye_finished());
        assert_eq!(s.eye_result(Eye::Left).value, acuity_value(6));
    }

    #[test]
    fn same_size_check_scans_non_consecutive_history() {
        let mut result = AcuityEyeResult::default();
        let first = AcuityLogEntry {
            size: 4,
            selected_option: "T".into(),
            correct: true,
        };
        let other = AcuityLogEntry {
            size: 3,
            selected_option: "A".into(),
            correct: false,
        };
        let latest = AcuityLogEntry {
            size: 4,
            selected_option: "T".into(),
            correct: true,
        };
        VisualAcuity::advance(4, &mut result, &latest, &[&first, &other, &latest]);
        assert!(result.finished);
        assert_eq!(result.value, acuity_value(4));
    }

    #[test]
    fn three_direction_changes_finish_the_eye() {
        let mut result = AcuityEyeResult {
            direction_change_counter: 2,
            ..AcuityEyeResult::default()
        };
        let latest = AcuityLogEntry {
            size: 3,
            selected_option: "A".into(),
            correct: false,
        };
        let next = VisualAcuity::advance(5, &mut result, &latest, &[&latest]);
        assert_eq!(next, 4);
        assert_eq!(result.direction_change_counter, 3);
        assert!(result.finished);
        assert_eq!(result.value, acuity_value(3));
    }

    #[test]
    fn step_never_leaves_range() {
        let mut s = session();
        for round in 0..20 {
            answer(&mut s, round % 3 != 0);
            assert!((1..=7).contains(&s.current_step()));
        }
    }

    #[test]
    fn value_stays_zero_until_finished() {
        let mut s = session();
        answer(&mut s, true);
        let left = s.eye_result(Eye::Left);
        assert!(!left.finished);
        assert_eq!(left.value, 0.0);
    }

    #[test]
    fn interpretation_keeps_left_right_asymmetry() {
        let i = interpret(0.7, 0.7);
        assert_eq!(i.left_eye.status, "Normal vision");
        assert_eq!(i.left_eye.note, "Excellent visual acuity");
        assert_eq!(i.right_eye.note, "Minor difficulty with smallest letters");
        assert_eq!(i.overall.recommendation, "No significant difference between eyes");

        let i = interpret(0.5, 0.7);
        assert_eq!(i.left_eye.status, "Possible impairment");
        assert_eq!(i.left_eye.note, "Mild reduction in acuity");
        assert_eq!(i.overall.recommendation, "Consider follow-up for right eye");
    }

    #[test]
    fn report_ready_after_both_eyes() {
        let mut s = session();
        answer(&mut s, false);
        s.restart(Eye::Right, fixed_now());
        for _ in 0..7 {
            answer(&mut s, true);
        }
        let ResultOutcome::Ready { report, .. } = s.result() else {
            panic!("expected ready result");
        };
        assert_eq!(report.left_eye, 0.1);
        assert_eq!(report.right_eye, 0.7);
    }
}
