//! Ishihara-style plate test over a fixed bank of seven plates.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{EyeState, VisionTest};
use crate::error::SessionError;
use crate::model::TestKind;

/// One plate of the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPlate {
    pub image_name: &'static str,
    pub image_url: &'static str,
    pub options: [&'static str; 5],
    pub correct_option: &'static str,
}

pub const PLATES: [ColorPlate; 7] = [
    ColorPlate {
        image_name: "ishihara_1",
        image_url: "/ColorTestImages/ishihara_1.svg",
        options: ["12", "46", "48", "42", "Nothing"],
        correct_option: "12",
    },
    ColorPlate {
        image_name: "ishihara_2",
        image_url: "/ColorTestImages/ishihara_2.svg",
        options: ["29", "89", "28", "21", "Nothing"],
        correct_option: "29",
    },
    ColorPlate {
        image_name: "ishihara_3",
        image_url: "/ColorTestImages/ishihara_3.svg",
        options: ["74", "14", "71", "76", "Nothing"],
        correct_option: "74",
    },
    ColorPlate {
        image_name: "ishihara_4",
        image_url: "/ColorTestImages/ishihara_4.svg",
        options: ["45", "15", "46", "48", "Nothing"],
        correct_option: "45",
    },
    ColorPlate {
        image_name: "ishihara_5",
        image_url: "/ColorTestImages/ishihara_5.svg",
        options: ["5", "6", "8", "9", "Nothing"],
        correct_option: "5",
    },
    ColorPlate {
        image_name: "ishihara_6",
        image_url: "/ColorTestImages/ishihara_6.svg",
        options: ["14", "36", "47", "32", "Nothing"],
        correct_option: "Nothing",
    },
    ColorPlate {
        image_name: "ishihara_7",
        image_url: "/ColorTestImages/ishihara_7.svg",
        options: ["8", "9", "6", "2", "Nothing"],
        correct_option: "8",
    },
];

#[allow(clippy::cast_possible_truncation)]
const BANK_LEN: u32 = PLATES.len() as u32;

/// Plate for a 1-based step.
#[must_use]
pub fn plate_for_step(step: u32) -> Option<&'static ColorPlate> {
    let index = step.checked_sub(1)? as usize;
    PLATES.get(index)
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorVision;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorEyeResult {
    pub correct_counter: u32,
    pub incorrect_counter: u32,
    pub finished: bool,
}

impl EyeState for ColorEyeResult {
    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Log entry carrying a snapshot of the plate that was answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorLogEntry {
    pub image_name: String,
    pub options: Vec<String>,
    pub correct_option: String,
    pub selected_option: String,
    pub correct: bool,
}

/// Plate as presented to the client. The correct option stays server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorQuestion {
    pub image_name: String,
    pub image_url: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorAnswer {
    pub selected_option: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorEyeVerdict {
    pub score: u32,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorReport {
    pub left_eye: ColorEyeVerdict,
    pub right_eye: ColorEyeVerdict,
    pub total_plates: u32,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

impl VisionTest for ColorVision {
    const KIND: TestKind = TestKind::ColorVision;
    const STEP_RANGE: std::ops::RangeInclusive<u32> = 1..=BANK_LEN;

    type EyeResult = ColorEyeResult;
    type LogEntry = ColorLogEntry;
    type Question = ColorQuestion;
    type Answer = ColorAnswer;
    type Report = ColorReport;

    fn question<R: Rng + ?Sized>(step: u32, _rng: &mut R) -> Option<ColorQuestion> {
        plate_for_step(step).map(|plate| ColorQuestion {
            image_name: plate.image_name.to_owned(),
            image_url: plate.image_url.to_owned(),
            options: plate.options.iter().map(|o| (*o).to_owned()).collect(),
        })
    }

    fn grade(step: u32, answer: ColorAnswer) -> Result<ColorLogEntry, SessionError> {
        let plate = plate_for_step(step).ok_or(SessionError::StepOutOfRange {
            step,
            min: 1,
            max: BANK_LEN,
        })?;
        Ok(ColorLogEntry {
            image_name: plate.image_name.to_owned(),
            options: plate.options.iter().map(|o| (*o).to_owned()).collect(),
            correct_option: plate.correct_option.to_owned(),
            correct: answer.selected_option == plate.correct_option,
            selected_option: answer.selected_option,
        })
    }

    fn is_correct(entry: &ColorLogEntry) -> bool {
        entry.correct
    }

    fn advance(
        step: u32,
        result: &mut ColorEyeResult,
        latest: &ColorLogEntry,
        _history: &[&ColorLogEntry],
    ) -> u32 {
        if latest.correct {
            result.correct_counter += 1;
        } else {
            result.incorrect_counter += 1;
        }

        if step >= BANK_LEN {
            result.finished = true;
            step
        } else {
            step + 1
        }
    }

    fn report(left: &ColorEyeResult, right: &ColorEyeResult) -> ColorReport {
        ColorReport {
            left_eye: ColorEyeVerdict {
                score: left.correct_counter,
                status: interpret(left.correct_counter),
            },
            right_eye: ColorEyeVerdict {
                score: right.correct_counter,
                status: interpret(right.correct_counter),
            },
            total_plates: BANK_LEN,
        }
    }
}

/// Label for a number of correctly read plates out of seven.
#[must_use]
pub fn interpret(correct: u32) -> &'static str {
    match correct {
        6.. => "Normal Color Vision",
        4..=5 => "Mild Deficiency",
        _ => "Color Vision Deficiency",
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
