//! Append-only audit log of thread moderation actions.
//!
//! One line per entry:
//! `<ISO-8601 UTC> | [<ACTION>] Thread '<name>' by <moderator> in <guild>[ - <detail>]`

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to write audit log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of state transition being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockAction {
    Lock,
    Unlock,
    Delete,
    AutoDelete,
}

impl LockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::Delete => "DELETE",
            Self::AutoDelete => "AUTO_DELETE",
        }
    }
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEventRecord {
    pub timestamp: DateTime<Utc>,
    pub action: LockAction,
    pub thread_name: String,
    pub moderator: String,
    pub guild: String,
    pub detail: Option<String>,
}

impl LockEventRecord {
    pub fn new(
        action: LockAction,
        thread_name: impl Into<String>,
        moderator: impl Into<String>,
        guild: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            thread_name: thread_name.into(),
            moderator: moderator.into(),
            guild: guild.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The log line without its timestamp.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "[{}] Thread '{}' by {} in {}",
            self.action, self.thread_name, self.moderator, self.guild
        );
        if let Some(detail) = &self.detail {
            line.push_str(" - ");
            line.push_str(detail);
        }
        line
    }
}

impl fmt::Display for LockEventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.summary()
        )
    }
}

/// Appends records to a flat UTF-8 text file.
///
/// Concurrent workflows share one logger; the mutex keeps lines whole.
pub struct AuditLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    pub fn append(&self, record: &LockEventRecord) -> Result<(), AuditError> {
        let io_err = |source| AuditError::Io {
            path: self.path.clone(),
            source,
        };

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(file, "{record}").map_err(io_err)
    }

    /// Record an action: emit it as a tracing event and append it to the file.
    ///
    /// A failed write is logged and otherwise ignored; the moderation action
    /// it describes has already happened or is about to.
    pub fn record(&self, record: LockEventRecord) {
        info!(target: "thread_actions", "{}", record.summary());
        crate::metrics::record_action(record.action.as_str());
        if let Err(e) = self.append(&record) {
            error!(target: "thread_actions", error = %e, "Failed to write to thread actions log");
        }
    }

    /// Read back every line. Used by tests and the status page.
    pub fn read_lines(&self) -> std::io::Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(String::from).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_format() {
        let mut record = LockEventRecord::new(LockAction::AutoDelete, "help me", "alice", "Guild")
            .with_detail("Auto-deleted from special channel");
        record.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            record.to_string(),
            "2024-05-01T12:30:00Z | [AUTO_DELETE] Thread 'help me' by alice in Guild - Auto-deleted from special channel"
        );

        let plain = LockEventRecord::new(LockAction::Lock, "t", "bob", "G");
        assert_eq!(plain.summary(), "[LOCK] Thread 't' by bob in G");
    }

    #[test]
    fn test_append_creates_directories_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path().join("logs/thread_actions.log"));
        assert!(logger.read_lines().unwrap().is_empty());

        logger.record(LockEventRecord::new(LockAction::Lock, "t", "bob", "G"));
        logger.record(LockEventRecord::new(LockAction::Unlock, "t", "bob", "G"));

        let lines = logger.read_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("| [LOCK] Thread 't' by bob in G"));
        assert!(lines[1].contains("[UNLOCK]"));
    }

    #[test]
    fn test_append_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // The log path is a directory, so opening it for append fails.
        let logger = AuditLogger::new(dir.path());
        let err = logger
            .append(&LockEventRecord::new(LockAction::Lock, "t", "b", "G"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to write audit log"));
    }
}
