use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

//
// ─── EYE ───────────────────────────────────────────────────────────────────────
//

/// The eye currently under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Eye::Left => "left",
            Eye::Right => "right",
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Eye {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Eye::Left),
            "right" => Ok(Eye::Right),
            _ => Err(ParseError::new("Eye", s)),
        }
    }
}

//
// ─── EYE PAIR ──────────────────────────────────────────────────────────────────
//

/// Per-eye records keyed by `Eye`.
///
/// Transitions reach a record only through `get_mut(eye)`, so a write always
/// names the eye it targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyePair<R> {
    left: R,
    right: R,
}

impl<R> EyePair<R> {
    #[must_use]
    pub fn new(left: R, right: R) -> Self {
        Self { left, right }
    }

    #[must_use]
    pub fn get(&self, eye: Eye) -> &R {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, eye: Eye) -> &mut R {
        match eye {
            Eye::Left => &mut self.left,
            Eye::Right => &mut self.right,
        }
    }

    #[must_use]
    pub fn left(&self) -> &R {
        &self.left
    }

    #[must_use]
    pub fn right(&self) -> &R {
        &self.right
    }
}

/// Completion flags for both eyes, returned while a result is not ready yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub left_done: bool,
    pub right_done: bool,
}

impl Progress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.left_done && self.right_done
    }
}

//
// ─── TEST KIND ─────────────────────────────────────────────────────────────────
//

/// The five self-test types. Each user has an independent session history per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    VisualAcuity,
    ContrastSensitivity,
    ColorVision,
    Astigmatism,
    TumblingE,
}

impl TestKind {
    pub const ALL: [TestKind; 5] = [
        TestKind::VisualAcuity,
        TestKind::ContrastSensitivity,
        TestKind::ColorVision,
        TestKind::Astigmatism,
        TestKind::TumblingE,
    ];

    /// Stable storage key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::VisualAcuity => "visual_acuity",
            TestKind::ContrastSensitivity => "contrast_sensitivity",
            TestKind::ColorVision => "color_vision",
            TestKind::Astigmatism => "astigmatism",
            TestKind::TumblingE => "tumbling_e",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = ParseError;

    /// Accepts the storage key with either `_` or `-` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().replace('-', "_");
        TestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key)
            .ok_or_else(|| ParseError::new("TestKind", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_parses_case_insensitively() {
        assert_eq!("Left".parse::<Eye>().unwrap(), Eye::Left);
        assert_eq!(" right ".parse::<Eye>().unwrap(), Eye::Right);
        assert!("both".parse::<Eye>().is_err());
    }

    #[test]
    fn eye_pair_writes_only_the_named_eye() {
        let mut pair = EyePair::new(0_u32, 0_u32);
        *pair.get_mut(Eye::Right) += 3;
        assert_eq!(*pair.left(), 0);
        assert_eq!(*pair.right(), 3);
    }

    #[test]
    fn test_kind_storage_key_round_trips() {
        for kind in TestKind::ALL {
            assert_eq!(kind.as_str().parse::<TestKind>().unwrap(), kind);
        }
        assert_eq!("tumbling-e".parse::<TestKind>().unwrap(), TestKind::TumblingE);
        assert!("snellen".parse::<TestKind>().is_err());
    }

    #[test]
    fn progress_json_uses_camel_case() {
        let json = serde_json::to_value(Progress {
            left_done: true,
            right_done: false,
        })
        .unwrap();
        assert_eq!(json["leftDone"], true);
        assert_eq!(json["rightDone"], false);
    }
}
