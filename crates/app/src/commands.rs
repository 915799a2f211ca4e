//! Command handlers. Each one drives a single service call and wraps the
//! outcome in an [`Envelope`].

use anyhow::Result;
use clap::Subcommand;
use services::{AppServices, TestServiceError, VisionTestService};
use vision_core::model::{Eye, QuestionOutcome, Submission, TestKind, UserId};
use vision_core::vision::VisionTest;
use vision_core::vision::acuity::AcuityAnswer;
use vision_core::vision::astigmatism::AstigmatismAnswer;
use vision_core::vision::color::ColorAnswer;
use vision_core::vision::contrast::ContrastAnswer;
use vision_core::vision::tumbling_e::{Direction, TumblingAnswer};

use crate::response::Envelope;

/// Runs `$body` with `$svc` bound to the service for `$kind`.
macro_rules! with_service {
    ($app:expr, $kind:expr, |$svc:ident| $body:expr) => {
        match $kind {
            TestKind::VisualAcuity => {
                let $svc = $app.visual_acuity();
                $body
            }
            TestKind::ContrastSensitivity => {
                let $svc = $app.contrast_sensitivity();
                $body
            }
            TestKind::ColorVision => {
                let $svc = $app.color_vision();
                $body
            }
            TestKind::Astigmatism => {
                let $svc = $app.astigmatism();
                $body
            }
            TestKind::TumblingE => {
                let $svc = $app.tumbling_e();
                $body
            }
        }
    };
}

/// Answer payloads, one per test type.
#[derive(Debug, Subcommand)]
pub enum AnswerCommand {
    /// Letter read from the chart
    VisualAcuity {
        #[arg(long)]
        option: String,
    },
    /// Grid cell picked as the different color
    ContrastSensitivity {
        /// Zero-based index of the selected cell
        #[arg(long)]
        index: usize,
        /// The grid as shown, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        colors: Vec<String>,
    },
    /// Number read from the plate
    ColorVision {
        #[arg(long)]
        option: String,
    },
    /// "Yes" if all lines look equally dark
    Astigmatism {
        #[arg(long)]
        option: String,
    },
    /// Direction of the E
    TumblingE {
        #[arg(long)]
        shown: Direction,
        #[arg(long)]
        selected: Direction,
    },
}

pub async fn start(
    app: &AppServices,
    user: UserId,
    kind: TestKind,
    eye: Eye,
    fresh: bool,
) -> Result<Envelope> {
    with_service!(app, kind, |svc| start_with(&svc, user, eye, fresh).await)
}

pub async fn question(app: &AppServices, user: UserId, kind: TestKind) -> Result<Envelope> {
    with_service!(app, kind, |svc| question_with(&svc, user).await)
}

pub async fn result(app: &AppServices, user: UserId, kind: TestKind) -> Result<Envelope> {
    with_service!(app, kind, |svc| result_with(&svc, user).await)
}

pub async fn history(
    app: &AppServices,
    user: UserId,
    kind: TestKind,
    limit: u32,
) -> Result<Envelope> {
    with_service!(app, kind, |svc| history_with(&svc, user, limit).await)
}

pub async fn answer(app: &AppServices, user: UserId, answer: AnswerCommand) -> Result<Envelope> {
    match answer {
        AnswerCommand::VisualAcuity { option } => {
            answer_with(
                &app.visual_acuity(),
                user,
                AcuityAnswer {
                    selected_option: option,
                },
            )
            .await
        }
        AnswerCommand::ContrastSensitivity { index, colors } => {
            answer_with(
                &app.contrast_sensitivity(),
                user,
                ContrastAnswer {
                    selected_index: index,
                    colors,
                },
            )
            .await
        }
        AnswerCommand::ColorVision { option } => {
            answer_with(
                &app.color_vision(),
                user,
                ColorAnswer {
                    selected_option: option,
                },
            )
            .await
        }
        AnswerCommand::Astigmatism { option } => {
            let parsed = AstigmatismAnswer::parse(&option).map_err(TestServiceError::from)?;
            answer_with(&app.astigmatism(), user, parsed).await
        }
        AnswerCommand::TumblingE { shown, selected } => {
            answer_with(
                &app.tumbling_e(),
                user,
                TumblingAnswer {
                    shown_direction: shown,
                    selected_direction: selected,
                },
            )
            .await
        }
    }
}

pub async fn all_results(app: &AppServices, user: UserId) -> Result<Envelope> {
    let results = app.results().all_results(user).await?;
    Ok(Envelope::ok("Test result fetched successfully", &results)?)
}

/// Message shown for a failed command.
pub fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TestServiceError>() {
        Some(TestServiceError::NotFound { .. }) => "Test not found".to_string(),
        _ => format!("{err:#}"),
    }
}

async fn start_with<T: VisionTest>(
    svc: &VisionTestService<T>,
    user: UserId,
    eye: Eye,
    fresh: bool,
) -> Result<Envelope> {
    let session = if fresh {
        svc.retake(user, eye).await?
    } else {
        svc.start_test(user, eye).await?
    };
    Ok(Envelope::ok("Test started", &session)?)
}

async fn question_with<T: VisionTest>(svc: &VisionTestService<T>, user: UserId) -> Result<Envelope> {
    let outcome = svc.get_question(user).await?;
    let message = match &outcome {
        QuestionOutcome::Finished { eye } => format!("{eye} eye test completed"),
        QuestionOutcome::Next { .. } => "Question ready".to_string(),
    };
    Ok(Envelope::ok(message, &outcome)?)
}

async fn answer_with<T: VisionTest>(
    svc: &VisionTestService<T>,
    user: UserId,
    answer: T::Answer,
) -> Result<Envelope> {
    let receipt = svc.submit_answer(user, answer).await?;
    let message = match receipt.submission {
        Submission::Recorded { .. } => "Answer recorded",
        Submission::EyeAlreadyFinished { .. } => "Test already completed for this eye",
    };
    Ok(Envelope::ok(message, &receipt)?)
}

async fn result_with<T: VisionTest>(svc: &VisionTestService<T>, user: UserId) -> Result<Envelope> {
    let outcome = svc.get_result(user).await?;
    let message = if outcome.is_ready() {
        "Test results ready"
    } else {
        "Both eye tests not completed yet"
    };
    Ok(Envelope::ok(message, &outcome)?)
}

async fn history_with<T: VisionTest>(
    svc: &VisionTestService<T>,
    user: UserId,
    limit: u32,
) -> Result<Envelope> {
    let sessions = svc.history(user, limit).await?;
    Ok(Envelope::ok(
        format!("{} session(s) found", sessions.len()),
        &sessions,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_core::time::fixed_clock;

    #[tokio::test]
    async fn missing_session_reads_as_test_not_found() {
        let app = AppServices::in_memory(fixed_clock());
        let err = question(&app, UserId::new(1), TestKind::Astigmatism)
            .await
            .unwrap_err();
        assert_eq!(failure_message(&err), "Test not found");
    }

    #[tokio::test]
    async fn astigmatism_round_through_handlers() {
        let app = AppServices::in_memory(fixed_clock());
        let user = UserId::new(1);

        let started = start(&app, user, TestKind::Astigmatism, Eye::Left, false)
            .await
            .unwrap();
        assert_eq!(started.message, "Test started");

        let recorded = answer(
            &app,
            user,
            AnswerCommand::Astigmatism {
                option: "Yes".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(recorded.message, "Answer recorded");
        let data = recorded.data.unwrap();
        assert_eq!(data["eyeFinished"], true);
        assert_eq!(data["session"]["eyes"]["left"]["seesAllLinesEqually"], true);

        let done = question(&app, user, TestKind::Astigmatism).await.unwrap();
        assert_eq!(done.message, "left eye test completed");

        let pending = result(&app, user, TestKind::Astigmatism).await.unwrap();
        assert_eq!(pending.message, "Both eye tests not completed yet");
    }

    #[tokio::test]
    async fn invalid_astigmatism_option_is_rejected() {
        let app = AppServices::in_memory(fixed_clock());
        let user = UserId::new(1);
        start(&app, user, TestKind::Astigmatism, Eye::Left, false)
            .await
            .unwrap();

        let err = answer(
            &app,
            user,
            AnswerCommand::Astigmatism {
                option: "maybe".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(failure_message(&err).contains("expected Yes or No"));
    }
}
