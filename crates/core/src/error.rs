use thiserror::Error;

/// Errors raised while applying a transition to a test session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("step {step} is outside the valid range {min}..={max}")]
    StepOutOfRange { step: u32, min: u32, max: u32 },

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
}

/// Error returned when parsing an id, eye or test kind from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to parse {kind} from {raw:?}")]
pub struct ParseError {
    kind: &'static str,
    raw: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }
}
