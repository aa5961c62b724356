//! Append-only timestamped event log.
//!
//! One line per notable event: run start/end, state observed, action
//! taken, outcome. The journal is the durable, human-readable companion to
//! the structured `tracing` output; an append failure degrades to a
//! warning and never fails the run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use tracing::warn;

/// Appends `[YYYY-MM-DD HH:MM:SS] message` lines to a log file.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Creates a journal writing to `path`. The file is created on first
    /// append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends one timestamped line. Failures are logged, not returned:
    /// the journal must never block a decision cycle.
    pub fn append(&self, message: &str) {
        let line = format!(
            "[{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(error) = result {
            warn!(path = %self.path.display(), %error, "journal append failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_creates_file_and_adds_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("portalguard.log");
        let journal = Journal::new(&path);

        journal.append("run start");
        journal.append("run end");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] run start"), "got: {}", lines[0]);
        assert!(lines[1].ends_with("] run end"), "got: {}", lines[1]);
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn test_append_timestamp_shape() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("portalguard.log");
        Journal::new(&path).append("x");

        let content = std::fs::read_to_string(&path).unwrap();
        // "[YYYY-MM-DD HH:MM:SS] x" — fixed-width prefix.
        assert_eq!(content.as_bytes()[0], b'[');
        assert_eq!(content.as_bytes()[20], b']');
        assert_eq!(&content[21..], " x\n");
    }

    #[test]
    fn test_append_to_unwritable_path_does_not_panic() {
        let journal = Journal::new("/nonexistent-dir/portalguard.log");
        journal.append("swallowed");
    }
}
