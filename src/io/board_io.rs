use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::io::store::{
    NewTask, StoreError, TaskStore, board_create_section, board_create_task, board_delete_task,
    board_update_section, board_update_task,
};
use crate::model::board::{Board, Mutation, Section, SectionPatch, Task, TaskPatch};

/// Store backed by `tasklane/board.json`.
///
/// Every call re-reads the file, so the CLI and the TUI see each other's
/// writes. Callers hold the project lock around writes.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    project_id: String,
}

impl FileStore {
    pub fn board_path(data_dir: &Path) -> PathBuf {
        data_dir.join("board.json")
    }

    /// Store for the board in `data_dir`. A missing file reads as an empty
    /// board for `project_id`.
    pub fn open(data_dir: &Path, project_id: &str) -> Self {
        FileStore {
            path: Self::board_path(data_dir),
            project_id: project_id.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Board, StoreError> {
        if !self.path.exists() {
            return Ok(Board::new(self.project_id.clone()));
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, board: &Board) -> Result<(), StoreError> {
        let mut content = serde_json::to_string_pretty(board)?;
        content.push('\n');
        if let Err(e) = recovery::atomic_write(&self.path, content.as_bytes()) {
            if let Some(data_dir) = self.path.parent() {
                recovery::log_recovery(
                    data_dir,
                    RecoveryEntry::new(RecoveryCategory::Write, "board write failed")
                        .field("Target", self.path.display().to_string())
                        .field("Error", e.to_string())
                        .body(content),
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Read, change, and write back in one step
    fn modify<T>(
        &mut self,
        change: impl FnOnce(&mut Board) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut board = self.read()?;
        let out = change(&mut board)?;
        self.write(&board)?;
        Ok(out)
    }
}

impl TaskStore for FileStore {
    fn load_board(&self) -> Result<Board, StoreError> {
        self.read()
    }

    fn create_section(&mut self, name: &str) -> Result<Section, StoreError> {
        self.modify(|board| Ok(board_create_section(board, name)))
    }

    fn create_task(&mut self, task: NewTask) -> Result<Task, StoreError> {
        self.modify(|board| board_create_task(board, task))
    }

    fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError> {
        tracing::debug!(id, ?patch, "update_task");
        self.modify(|board| board_update_task(board, id, patch))
    }

    fn update_section(&mut self, id: &str, patch: &SectionPatch) -> Result<Section, StoreError> {
        tracing::debug!(id, ?patch, "update_section");
        self.modify(|board| board_update_section(board, id, patch))
    }

    fn delete_task(&mut self, id: &str) -> Result<(), StoreError> {
        self.modify(|board| board_delete_task(board, id))
    }

    fn atomic_batch(&self) -> bool {
        true
    }

    /// All mutations land in one file replace, or none do
    fn apply_batch(&mut self, mutations: &[Mutation]) -> Result<(), StoreError> {
        tracing::debug!(count = mutations.len(), "apply_batch");
        self.modify(|board| {
            for m in mutations {
                match m {
                    Mutation::Task { id, patch } => {
                        board_update_task(board, id, patch)?;
                    }
                    Mutation::Section { id, patch } => {
                        board_update_section(board, id, patch)?;
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_an_empty_board() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path(), "P");
        let board = store.load_board().unwrap();
        assert_eq!(board, Board::new("P"));
        assert!(!store.path().exists());
    }

    #[test]
    fn writes_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut store = FileStore::open(tmp.path(), "P");
        let s = store.create_section("Now").unwrap();
        store
            .create_task(NewTask {
                title: "write docs".into(),
                section_id: Some(s.id),
                ..Default::default()
            })
            .unwrap();

        let reopened = FileStore::open(tmp.path(), "ignored");
        let board = reopened.load_board().unwrap();
        assert_eq!(board.project_id, "P");
        assert_eq!(board.task("T-001").unwrap().title, "write docs");
        assert_eq!(board.task("T-001").unwrap().section_id.as_deref(), Some("S-001"));
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut store = FileStore::open(tmp.path(), "P");
        store.create_section("Now").unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let mutations = vec![
            Mutation::Section {
                id: "S-001".into(),
                patch: SectionPatch {
                    name: Some("Today".into()),
                    ..Default::default()
                },
            },
            Mutation::Task {
                id: "T-404".into(),
                patch: TaskPatch::default(),
            },
        ];
        assert!(store.atomic_batch());
        assert!(matches!(
            store.apply_batch(&mutations),
            Err(StoreError::TaskNotFound(_))
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(FileStore::board_path(tmp.path()), "{ not json").unwrap();
        let store = FileStore::open(tmp.path(), "P");
        assert!(matches!(store.load_board(), Err(StoreError::Parse(_))));
    }
}
