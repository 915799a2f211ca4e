//! Single yes/no question per eye over a radial line chart.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{EyeState, VisionTest};
use crate::error::SessionError;
use crate::model::TestKind;

pub const INSTRUCTION: &str = "Cover your left eye. Keep your device at arm's length. Focus on the center of the semicircle. Do all the lines look like they are in the same shade of black?";
pub const OPTIONS: [&str; 2] = ["Yes", "No"];
pub const CHART_IMAGE: &str = "radial-lines.svg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Astigmatism;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AstigmatismEyeResult {
    /// `None` until the eye has answered.
    pub sees_all_lines_equally: Option<bool>,
    pub finished: bool,
}

impl EyeState for AstigmatismEyeResult {
    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstigmatismLogEntry {
    pub user_response: bool,
    pub image_shown: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AstigmatismQuestion {
    pub instruction: &'static str,
    pub options: [&'static str; 2],
}

/// "Yes" means every line looks equally dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstigmatismAnswer {
    pub sees_all_lines_equally: bool,
}

impl AstigmatismAnswer {
    /// Parse the option label the client selected.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidAnswer` for anything but yes/no.
    pub fn parse(selected_option: &str) -> Result<Self, SessionError> {
        match selected_option.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self {
                sees_all_lines_equally: true,
            }),
            "no" => Ok(Self {
                sees_all_lines_equally: false,
            }),
            other => Err(SessionError::InvalidAnswer(format!(
                "expected Yes or No, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AstigmatismVerdict {
    pub response: Option<bool>,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AstigmatismReport {
    pub left_eye: AstigmatismVerdict,
    pub right_eye: AstigmatismVerdict,
}

impl VisionTest for Astigmatism {
    const KIND: TestKind = TestKind::Astigmatism;
    const STEP_RANGE: std::ops::RangeInclusive<u32> = 1..=2;

    type EyeResult = AstigmatismEyeResult;
    type LogEntry = AstigmatismLogEntry;
    type Question = AstigmatismQuestion;
    type Answer = AstigmatismAnswer;
    type Report = AstigmatismReport;

    fn question<R: Rng + ?Sized>(_step: u32, _rng: &mut R) -> Option<AstigmatismQuestion> {
        Some(AstigmatismQuestion {
            instruction: INSTRUCTION,
            options: OPTIONS,
        })
    }

    fn grade(_step: u32, answer: AstigmatismAnswer) -> Result<AstigmatismLogEntry, SessionError> {
        Ok(AstigmatismLogEntry {
            user_response: answer.sees_all_lines_equally,
            image_shown: CHART_IMAGE.to_owned(),
        })
    }

    fn is_correct(entry: &AstigmatismLogEntry) -> bool {
        entry.user_response
    }

    fn advance(
        step: u32,
        result: &mut AstigmatismEyeResult,
        latest: &AstigmatismLogEntry,
        _history: &[&AstigmatismLogEntry],
    ) -> u32 {
        result.sees_all_lines_equally = Some(latest.user_response);
        result.finished = true;
        step + 1
    }

    fn report(left: &AstigmatismEyeResult, right: &AstigmatismEyeResult) -> AstigmatismReport {
        AstigmatismReport {
            left_eye: AstigmatismVerdict {
                response: left.sees_all_lines_equally,
                status: interpret(left.sees_all_lines_equally),
            },
            right_eye: AstigmatismVerdict {
                response: right.sees_all_lines_equally,
                status: interpret(right.sees_all_lines_equally),
            },
        }
    }
}

#[must_use]
pub fn interpret(sees_all_lines_equally: Option<bool>) -> &'static str {
    if sees_all_lines_equally == Some(true) {
        "No Astigmatism Detected"
    } else {
        "Possible Astigmatism"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Eye, ResultOutcome, Session, Submission, UserId};
    use crate::time::fixed_now;

    #[test]
    fn parse_accepts_yes_and_no_only() {
        assert!(AstigmatismAnswer::parse("Yes").unwrap().sees_all_lines_equally);
        assert!(!AstigmatismAnswer::parse(" no ").unwrap().sees_all_lines_equally);
        assert!(AstigmatismAnswer::parse("maybe").is_err());
    }

    #[test]
    fn one_answer_finishes_the_eye() {
        let mut s: Session<Astigmatism> = Session::new(UserId::new(1), Eye::Left, fixed_now());
        let outcome = s
            .submit(AstigmatismAnswer::parse("No").unwrap(), fixed_now())
            .unwrap();

        assert_eq!(
            outcome,
            Submission::Recorded {
                eye: Eye::Left,
                correct: false,
                eye_finished: true,
                next_step: 2,
            }
        );
        let left = s.eye_result(Eye::Left);
        assert_eq!(left.sees_all_lines_equally, Some(false));
        assert!(left.finished);
        assert_eq!(s.logs()[0].entry.image_shown, CHART_IMAGE);
    }

    #[test]
    fn no_reads_as_possible_astigmatism() {
        let mut s: Session<Astigmatism> = Session::new(UserId::new(1), Eye::Left, fixed_now());
        s.submit(AstigmatismAnswer::parse("No").unwrap(), fixed_now())
            .unwrap();
        s.restart(Eye::Right, fixed_now());
        s.submit(AstigmatismAnswer::parse("Yes").unwrap(), fixed_now())
            .unwrap();

        let ResultOutcome::Ready { report, .. } = s.result() else {
            panic!("expected ready result");
        };
        assert_eq!(report.left_eye.status, "Possible Astigmatism");
        assert_eq!(report.right_eye.status, "No Astigmatism Detected");
    }
    #[test]
    fn ready_result_carries_answers_of_both_eyes() {
        let mut s: Session<Astigmatism> = Session::new(UserId::new(1), Eye::Left, fixed_now());
        let pending = serde_json::to_value(s.result()).unwrap();
        assert_eq!(pending["state"], "pending");
        assert!(pending.get("logs").is_none());

        s.submit(AstigmatismAnswer::parse("No").unwrap(), fixed_now())
            .unwrap();
        s.restart(Eye::Right, fixed_now());
        s.submit(AstigmatismAnswer::parse("Yes").unwrap(), fixed_now())
            .unwrap();

        let json = serde_json::to_value(s.result()).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["report"]["leftEye"]["response"], false);
        let logs = json["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["eye"], "left");
        assert_eq!(logs[0]["userResponse"], false);
        assert_eq!(logs[1]["eye"], "right");
        assert_eq!(logs[1]["imageShown"], CHART_IMAGE);
    }
}
