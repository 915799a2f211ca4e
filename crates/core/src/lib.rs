#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod time;
pub mod vision;

pub use error::{ParseError, SessionError};
pub use time::Clock;
