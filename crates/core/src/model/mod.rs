mod eye;
mod ids;
mod session;

pub use eye::{Eye, EyePair, Progress, TestKind};
pub use ids::{SessionId, UserId};
pub use session::{LogRecord, QuestionOutcome, ResultOutcome, Session, Submission};
