//! Database URL handling for the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub const DEFAULT_DB_URL: &str = "sqlite://vision.sqlite3";

/// Turns a path-like or `sqlite:` URL into an absolute `sqlite://` URL.
///
/// `sqlite::memory:` and URLs already in `sqlite://` form pass through.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Whether `db_url` names an in-memory database.
fn is_memory_url(db_url: &str) -> bool {
    db_url.contains(":memory:") || db_url.contains("mode=memory")
}

/// Creates the database file and its parent directories if missing.
///
/// In-memory databases are refused: every command runs in its own process,
/// so a session started by one command would be gone for the next.
pub fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if is_memory_url(db_url) {
        bail!("in-memory database {db_url} does not persist between commands; pass a file path to --db");
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid --db value: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }

    Ok(())
}
