use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::model::board::{Mutation, Task};

/// Header written at the top of a new recovery log.
const FILE_HEADER: &str = "\
<!-- tasklane recovery log: append-only
     Updates tasklane could not apply or undo, and deleted tasks.
     Safe to delete once reviewed. -->

---
";

/// Category of a recovery entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A dispatch whose rollback failed
    Dispatch,
    /// A board write that failed
    Write,
    /// Tasks removed by `rm`
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Dispatch => write!(f, "dispatch"),
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Delete => write!(f, "delete"),
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Markdown block for the log
    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} {}: {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }
}

pub fn recovery_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".recovery.log")
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Append an entry to the log. Failures are logged and otherwise ignored.
pub fn log_recovery(data_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(data_dir, &entry) {
        tracing::warn!(error = %e, "could not write to recovery log");
    }
}

fn append_entry(data_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(data_dir);
    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())?;
    Ok(())
}

/// Record mutations that were applied and could not be undone
pub fn log_stranded_mutations(data_dir: &Path, cause: &str, stranded: &[Mutation]) {
    let body = serde_json::to_string_pretty(stranded).unwrap_or_default();
    log_recovery(
        data_dir,
        RecoveryEntry::new(RecoveryCategory::Dispatch, "rollback incomplete")
            .field("Error", cause)
            .field("Stranded", stranded.len().to_string())
            .body(body),
    );
}

/// Record tasks removed by a delete
pub fn log_task_deletion(data_dir: &Path, removed: &[Task]) {
    let Some(first) = removed.first() else {
        return;
    };
    let body = serde_json::to_string_pretty(removed).unwrap_or_default();
    log_recovery(
        data_dir,
        RecoveryEntry::new(RecoveryCategory::Delete, format!("task {} deleted", first.id))
            .field("Task", first.title.clone())
            .field("Removed", removed.len().to_string())
            .body(body),
    );
}

/// Number of entries in the log (0 if there is no log)
pub fn recovery_entry_count(data_dir: &Path) -> usize {
    std::fs::read_to_string(recovery_log_path(data_dir))
        .map(|content| content.lines().filter(|l| l.starts_with("## ")).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::board::TaskPatch;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("board.json");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        // No temp files left behind
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn entries_are_appended_after_one_header() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(recovery_entry_count(tmp.path()), 0);

        let stranded = vec![Mutation::Task {
            id: "T-004".into(),
            patch: TaskPatch {
                display_order: Some(2),
                ..Default::default()
            },
        }];
        log_stranded_mutations(tmp.path(), "disk full", &stranded);
        log_recovery(
            tmp.path(),
            RecoveryEntry::new(RecoveryCategory::Write, "board write failed"),
        );

        let content = std::fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert_eq!(content.matches("recovery log").count(), 1);
        assert!(content.contains("dispatch: rollback incomplete"));
        assert!(content.contains("Error: disk full"));
        assert!(content.contains("\"id\": \"T-004\""));
        assert!(content.contains("write: board write failed"));
        assert_eq!(recovery_entry_count(tmp.path()), 2);
    }

    #[test]
    fn empty_deletion_is_not_logged() {
        let tmp = TempDir::new().unwrap();
        log_task_deletion(tmp.path(), &[]);
        assert!(!recovery_log_path(tmp.path()).exists());
    }
}
