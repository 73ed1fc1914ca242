//! Append-only log of every question and the answer it received.
//!
//! Each interaction is written as:
//!
//! ```text
//! 2024-05-01 12:00:00 | Question: What are the admission requirements?
//! 2024-05-01 12:00:00 | Answer: You need a high school diploma.
//! 2024-05-01 12:00:00 | Source: model
//! --------------------------------------------------------------------------------
//! ```
//!
//! Failing to write is reported through `tracing` and never interrupts the
//! conversation.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use qa_rag::Answer;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SEPARATOR_WIDTH: usize = 80;

/// Render one log entry.
pub fn format_entry(timestamp: &DateTime<Local>, question: &str, answer: &Answer) -> String {
    let ts = timestamp.format(TIMESTAMP_FORMAT);
    format!(
        "{ts} | Question: {question}\n{ts} | Answer: {}\n{ts} | Source: {}\n{}\n",
        answer.text,
        answer.source,
        "-".repeat(SEPARATOR_WIDTH)
    )
}

/// Appends interactions to a text file.
#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry stamped with the current local time.
    pub async fn record(&self, question: &str, answer: &Answer) {
        let entry = format_entry(&Local::now(), question, answer);
        if let Err(e) = self.append(&entry).await {
            warn!(path = %self.path.display(), error = %e, "failed to write interaction log");
        }
    }

    async fn append(&self, entry: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await
    }
}
