use chrono::Local;

use crate::model::board::{Board, Mutation, Section, SectionPatch, SiblingGroup, Task, TaskPatch};

/// Error type for persistence calls
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("section not found: {0}")]
    SectionNotFound(String),
    #[error("{0} is a subtask; subtasks cannot have subtasks")]
    NotTopLevel(String),
    #[error("could not write board: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse board: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Fields for a new task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub section_id: Option<String>,
    pub parent_task_id: Option<String>,
}

/// The task/section persistence service.
///
/// New entities are appended at the end of their sibling group.
pub trait TaskStore {
    /// Fetch the authoritative collections
    fn load_board(&self) -> Result<Board, StoreError>;

    fn create_section(&mut self, name: &str) -> Result<Section, StoreError>;

    fn create_task(&mut self, task: NewTask) -> Result<Task, StoreError>;

    fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError>;

    fn update_section(&mut self, id: &str, patch: &SectionPatch) -> Result<Section, StoreError>;

    /// Delete a task and its subtasks
    fn delete_task(&mut self, id: &str) -> Result<(), StoreError>;

    /// True when `apply_batch` applies all mutations or none of them
    fn atomic_batch(&self) -> bool {
        false
    }

    /// Apply several mutations as one request. The default issues one call
    /// per mutation and stops at the first failure, leaving earlier calls
    /// applied; such stores report `atomic_batch() == false`.
    fn apply_batch(&mut self, mutations: &[Mutation]) -> Result<(), StoreError> {
        for m in mutations {
            apply_one(self, m)?;
        }
        Ok(())
    }
}

/// Issue the single store call matching `mutation`
pub fn apply_one<S: TaskStore + ?Sized>(store: &mut S, mutation: &Mutation) -> Result<(), StoreError> {
    match mutation {
        Mutation::Task { id, patch } => store.update_task(id, patch).map(|_| ()),
        Mutation::Section { id, patch } => store.update_section(id, patch).map(|_| ()),
    }
}

fn today_str() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Allocate the next `{prefix}-NNN` id not used on the board
pub(crate) fn next_id(board: &Board, prefix: &str) -> String {
    let prefix_dash = format!("{}-", prefix);
    let ids = board
        .sections
        .iter()
        .map(|s| s.id.as_str())
        .chain(board.tasks.iter().map(|t| t.id.as_str()));
    let max = ids
        .filter_map(|id| id.strip_prefix(&prefix_dash))
        .filter_map(|n| n.parse::<usize>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{:03}", prefix, max + 1)
}

// ---------------------------------------------------------------------------
// Board-level implementations shared by the stores
// ---------------------------------------------------------------------------

pub(crate) fn board_create_section(board: &mut Board, name: &str) -> Section {
    let section = Section {
        id: next_id(board, "S"),
        project_id: board.project_id.clone(),
        name: name.to_string(),
        display_order: board.next_order(&SiblingGroup::Sections),
    };
    board.sections.push(section.clone());
    section
}

pub(crate) fn board_create_task(board: &mut Board, new: NewTask) -> Result<Task, StoreError> {
    let section_id = match &new.parent_task_id {
        Some(parent_id) => {
            let parent = board
                .task(parent_id)
                .ok_or_else(|| StoreError::TaskNotFound(parent_id.clone()))?;
            if parent.is_subtask() {
                return Err(StoreError::NotTopLevel(parent_id.clone()));
            }
            None
        }
        None => {
            if let Some(section_id) = &new.section_id
                && board.section(section_id).is_none()
            {
                return Err(StoreError::SectionNotFound(section_id.clone()));
            }
            new.section_id
        }
    };
    let mut task = Task {
        id: next_id(board, "T"),
        project_id: board.project_id.clone(),
        section_id,
        parent_task_id: new.parent_task_id,
        title: new.title,
        completed: false,
        display_order: 0,
        added: Some(today_str()),
    };
    task.display_order = board.next_order(&task.group());
    board.tasks.push(task.clone());
    Ok(task)
}

pub(crate) fn board_update_task(
    board: &mut Board,
    id: &str,
    patch: &TaskPatch,
) -> Result<Task, StoreError> {
    if let Some(Some(section_id)) = &patch.section_id
        && board.section(section_id).is_none()
    {
        return Err(StoreError::SectionNotFound(section_id.clone()));
    }
    if let Some(Some(parent_id)) = &patch.parent_task_id
        && board.task(parent_id).is_none()
    {
        return Err(StoreError::TaskNotFound(parent_id.clone()));
    }
    let task = board
        .task_mut(id)
        .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
    patch.apply_to(task);
    Ok(task.clone())
}

pub(crate) fn board_update_section(
    board: &mut Board,
    id: &str,
    patch: &SectionPatch,
) -> Result<Section, StoreError> {
    let section = board
        .section_mut(id)
        .ok_or_else(|| StoreError::SectionNotFound(id.to_string()))?;
    patch.apply_to(section);
    Ok(section.clone())
}

pub(crate) fn board_delete_task(board: &mut Board, id: &str) -> Result<(), StoreError> {
    if board.task(id).is_none() {
        return Err(StoreError::TaskNotFound(id.to_string()));
    }
    board
        .tasks
        .retain(|t| t.id != id && t.parent_task_id.as_deref() != Some(id));
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store. Update calls can be made to fail for testing partial
/// dispatch failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    board: Board,
    /// Number of update calls received so far
    updates: usize,
    /// Fail update calls whose 1-based sequence number is listed here
    fail_updates: Vec<usize>,
}

impl MemoryStore {
    pub fn new(project_id: &str) -> Self {
        MemoryStore {
            board: Board::new(project_id),
            ..Default::default()
        }
    }

    pub fn with_board(board: Board) -> Self {
        MemoryStore {
            board,
            ..Default::default()
        }
    }

    /// Make the n-th update call from now (1-based) fail
    pub fn fail_update(&mut self, nth: usize) {
        self.fail_updates.push(self.updates + nth);
    }

    /// Number of update calls received
    pub fn update_calls(&self) -> usize {
        self.updates
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    fn count_update(&mut self, id: &str) -> Result<(), StoreError> {
        self.updates += 1;
        if self.fail_updates.contains(&self.updates) {
            return Err(StoreError::Rejected(format!("update of {} refused", id)));
        }
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    fn load_board(&self) -> Result<Board, StoreError> {
        Ok(self.board.clone())
    }

    fn create_section(&mut self, name: &str) -> Result<Section, StoreError> {
        Ok(board_create_section(&mut self.board, name))
    }

    fn create_task(&mut self, task: NewTask) -> Result<Task, StoreError> {
        board_create_task(&mut self.board, task)
    }

    fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError> {
        self.count_update(id)?;
        board_update_task(&mut self.board, id, patch)
    }

    fn update_section(&mut self, id: &str, patch: &SectionPatch) -> Result<Section, StoreError> {
        self.count_update(id)?;
        board_update_section(&mut self.board, id, patch)
    }

    fn delete_task(&mut self, id: &str) -> Result<(), StoreError> {
        board_delete_task(&mut self.board, id)
    }
}
