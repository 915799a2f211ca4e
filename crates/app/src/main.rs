//! `vision` command-line front end.

use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use services::{AppServices, Clock};
use tracing_subscriber::EnvFilter;
use vision_core::model::{Eye, TestKind, UserId};

mod commands;
mod config;
mod response;

use commands::AnswerCommand;
use response::Envelope;

#[derive(Parser)]
#[command(name = "vision", version, about = "Adaptive self-administered vision tests")]
struct Cli {
    /// `SQLite` database URL or file path. In-memory databases are rejected
    /// because sessions must outlive a single command.
    #[arg(long, env = "VISION_DB_URL", default_value = config::DEFAULT_DB_URL)]
    db: String,

    /// User taking the tests
    #[arg(long, env = "VISION_USER_ID")]
    user: UserId,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a test for one eye, restarting the latest session if there is one
    Start { test: TestKind, eye: Eye },

    /// Begin a fresh session, keeping earlier ones as history
    Retake { test: TestKind, eye: Eye },

    /// Show the next question for the active eye
    Question { test: TestKind },

    /// Submit an answer for the active eye
    Answer {
        #[command(subcommand)]
        answer: AnswerCommand,
    },

    /// Show the interpreted result once both eyes are done
    Result { test: TestKind },

    /// List past sessions of a test, newest first
    History {
        test: TestKind,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Latest result of every test type
    Results,
}

async fn build_services(db: &str) -> Result<AppServices> {
    let db_url = config::normalize_sqlite_url(db);
    config::prepare_sqlite_file(&db_url)?;
    Ok(AppServices::new_sqlite(&db_url, Clock::system()).await?)
}

async fn run(cli: Cli) -> Result<Envelope> {
    let app = build_services(&cli.db).await?;
    let user = cli.user;

    match cli.command {
        Commands::Start { test, eye } => commands::start(&app, user, test, eye, false).await,
        Commands::Retake { test, eye } => commands::start(&app, user, test, eye, true).await,
        Commands::Question { test } => commands::question(&app, user, test).await,
        Commands::Answer { answer } => commands::answer(&app, user, answer).await,
        Commands::Result { test } => commands::result(&app, user, test).await,
        Commands::History { test, limit } => commands::history(&app, user, test, limit).await,
        Commands::Results => commands::all_results(&app, user).await,
    }
}

fn print(envelope: &Envelope) {
    match serde_json::to_string_pretty(envelope) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("Error: {err}"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(envelope) => print(&envelope),
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            print(&Envelope::failure(commands::failure_message(&err)));
            process::exit(2);
        }
    }
}
