//! Where status updates end up.

use std::io::{self, Write};
use std::sync::Mutex;

use colored::Colorize;
use serde::Serialize;

/// Presentation hint attached to every update. Never used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Navigating,
    Querying,
    NotArchived,
    Archived,
    Error,
    /// Page is not a video page
    Inert,
    /// Archive request accepted by the archiver
    Triggered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub message: String,
    pub category: StatusCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl StatusUpdate {
    pub fn new(message: impl Into<String>, category: StatusCategory) -> Self {
        Self {
            message: message.into(),
            category,
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

pub trait StatusSink: Send + Sync {
    fn publish(&self, update: StatusUpdate);
}

/// Colored one-line-per-update output on stdout.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl TerminalSink {
    fn write_update(out: &mut impl Write, update: &StatusUpdate) -> io::Result<()> {
        let marker = match update.category {
            StatusCategory::Navigating => "↻".blue(),
            StatusCategory::Querying => "…".yellow(),
            StatusCategory::NotArchived => "✗".red(),
            StatusCategory::Archived => "✓".green(),
            StatusCategory::Error => "!".red().bold(),
            StatusCategory::Inert => "·".dimmed(),
            StatusCategory::Triggered => "✓".cyan(),
        };

        match &update.link {
            Some(link) => writeln!(out, "{} {} {}", marker, update.message, link.underline())?,
            None => writeln!(out, "{} {}", marker, update.message)?,
        }
        out.flush()
    }
}

impl StatusSink for TerminalSink {
    /// Write errors (e.g. a closed pipe) are dropped.
    fn publish(&self, update: StatusUpdate) {
        let mut stdout = io::stdout().lock();
        let _ = Self::write_update(&mut stdout, &update);
    }
}

/// One JSON object per line on stdout, for scripting.
#[derive(Debug, Default)]
pub struct JsonSink;

impl StatusSink for JsonSink {
    fn publish(&self, update: StatusUpdate) {
        match serde_json::to_string(&update) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "{}", line);
                let _ = stdout.flush();
            }
            Err(e) => tracing::warn!("Failed to encode status update: {}", e),
        }
    }
}

/// Keeps every update in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<StatusUpdate> {
        self.updates.lock().ok().and_then(|u| u.last().cloned())
    }
}

impl StatusSink for MemorySink {
    fn publish(&self, update: StatusUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}
