use std::collections::HashSet;

use serde::Serialize;

use crate::dnd::dispatch::{DispatchError, DispatchReport, Dispatcher};
use crate::dnd::geometry::GeometryKey;
use crate::dnd::hit_test::{DragSubject, DropTarget};
use crate::dnd::planner::{PlanError, plan_compaction, plan_drop, plan_full_compaction};
use crate::io::store::{NewTask, StoreError, TaskStore};
use crate::model::board::{
    Board, GroupViolation, Mutation, Section, SectionPatch, Task, TaskPatch,
};

/// Error type for board operations
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("no task or section with id {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn clean_title(title: &str) -> Result<String, OpsError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(OpsError::EmptyTitle);
    }
    Ok(title.to_string())
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Append a section after the existing ones
pub fn add_section(store: &mut dyn TaskStore, name: &str) -> Result<Section, OpsError> {
    let name = clean_title(name)?;
    Ok(store.create_section(&name)?)
}

/// Append a top-level task to a section (None = unsectioned)
pub fn add_task(
    store: &mut dyn TaskStore,
    title: &str,
    section_id: Option<&str>,
) -> Result<Task, OpsError> {
    let task = store.create_task(NewTask {
        title: clean_title(title)?,
        section_id: section_id.map(String::from),
        parent_task_id: None,
    })?;
    tracing::debug!(id = %task.id, order = task.display_order, "task added");
    Ok(task)
}

/// Append a subtask under a top-level task
pub fn add_subtask(
    store: &mut dyn TaskStore,
    parent_id: &str,
    title: &str,
) -> Result<Task, OpsError> {
    let task = store.create_task(NewTask {
        title: clean_title(title)?,
        section_id: None,
        parent_task_id: Some(parent_id.to_string()),
    })?;
    Ok(task)
}

// ---------------------------------------------------------------------------
// Field edits
// ---------------------------------------------------------------------------

pub fn set_completed(store: &mut dyn TaskStore, id: &str, completed: bool) -> Result<Task, OpsError> {
    let patch = TaskPatch {
        completed: Some(completed),
        ..Default::default()
    };
    Ok(store.update_task(id, &patch)?)
}

pub fn set_title(store: &mut dyn TaskStore, id: &str, title: &str) -> Result<Task, OpsError> {
    let patch = TaskPatch {
        title: Some(clean_title(title)?),
        ..Default::default()
    };
    Ok(store.update_task(id, &patch)?)
}

pub fn rename_section(store: &mut dyn TaskStore, id: &str, name: &str) -> Result<Section, OpsError> {
    let patch = SectionPatch {
        name: Some(clean_title(name)?),
        ..Default::default()
    };
    Ok(store.update_section(id, &patch)?)
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Result of `delete_task`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    /// The task and its subtasks, as they were before deletion
    pub removed: Vec<Task>,
    /// Renumbering issued for the emptied slot (eager compaction only)
    pub compacted: Option<DispatchReport>,
}

/// Delete a task (and its subtasks).
///
/// With `compact` false the remaining siblings keep their orders and the
/// gap closes on the next reorder of the group. With `compact` true the
/// group is renumbered right away.
pub fn delete_task(
    store: &mut dyn TaskStore,
    dispatcher: &Dispatcher,
    id: &str,
    compact: bool,
) -> Result<DeleteOutcome, OpsError> {
    let board = store.load_board()?;
    let task = board
        .task(id)
        .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
    let group = task.group();
    let removed: Vec<Task> = board
        .tasks
        .iter()
        .filter(|t| t.id == id || t.parent_task_id.as_deref() == Some(id))
        .cloned()
        .collect();

    store.delete_task(id)?;
    tracing::debug!(id, removed = removed.len(), compact, "task deleted");

    let compacted = if compact {
        let board = store.load_board()?;
        let plan = plan_compaction(&board, &group);
        Some(dispatcher.dispatch(store, &board, &plan)?)
    } else {
        None
    };
    Ok(DeleteOutcome { removed, compacted })
}

// ---------------------------------------------------------------------------
// Reordering
// ---------------------------------------------------------------------------

/// Result of `move_entity`
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub subject: DragSubject,
    pub target: DropTarget,
    /// The calls that change something, in dispatch order
    pub mutations: Vec<Mutation>,
    /// None for a dry run
    pub report: Option<DispatchReport>,
}

/// Move a task or section as if it had been dropped on `target`.
/// A dry run plans without touching the store.
pub fn move_entity(
    store: &mut dyn TaskStore,
    dispatcher: &Dispatcher,
    id: &str,
    target: DropTarget,
    dry_run: bool,
) -> Result<MoveOutcome, OpsError> {
    let board = store.load_board()?;
    let subject = subject_for(&board, id).ok_or_else(|| OpsError::NotFound(id.to_string()))?;
    let plan = plan_drop(&subject, &target, &board)?;
    let mutations = plan.effective(&board);

    let report = if dry_run {
        None
    } else {
        Some(dispatcher.dispatch(store, &board, &plan)?)
    };
    Ok(MoveOutcome {
        subject,
        target,
        mutations,
        report,
    })
}

/// The drag subject for a task or section id
pub fn subject_for(board: &Board, id: &str) -> Option<DragSubject> {
    let key = if board.section(id).is_some() {
        GeometryKey::Section(id.to_string())
    } else {
        GeometryKey::Task(id.to_string())
    };
    DragSubject::from_board(board, &key)
}

/// Renumber every sibling group densely
pub fn compact(store: &mut dyn TaskStore, dispatcher: &Dispatcher) -> Result<DispatchReport, OpsError> {
    let board = store.load_board()?;
    let plan = plan_full_compaction(&board);
    Ok(dispatcher.dispatch(store, &board, &plan)?)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Structured result from `tl check`
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    /// Groups with gaps or duplicate orders. Gaps left by deletes are
    /// expected until the next reorder or `tl compact`.
    pub violations: Vec<GroupViolation>,
}

/// A structural problem on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckError {
    DuplicateId { id: String },
    /// `section_id` names a section that does not exist
    DanglingSection { task_id: String, section_id: String },
    /// `parent_task_id` names a task that does not exist
    DanglingParent { task_id: String, parent_id: String },
    /// A subtask whose parent is itself a subtask
    NestedSubtask { task_id: String, parent_id: String },
    /// A subtask that also carries a section
    SubtaskWithSection { task_id: String },
    /// Entity stamped with another project's id
    ForeignProject { id: String, project_id: String },
}

/// Check the board's structural invariants and ordering density
pub fn check(board: &Board) -> CheckResult {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    let ids = board
        .sections
        .iter()
        .map(|s| (&s.id, &s.project_id))
        .chain(board.tasks.iter().map(|t| (&t.id, &t.project_id)));
    for (id, project_id) in ids {
        if !seen.insert(id.as_str()) {
            errors.push(CheckError::DuplicateId { id: id.clone() });
        }
        if *project_id != board.project_id {
            errors.push(CheckError::ForeignProject {
                id: id.clone(),
                project_id: project_id.clone(),
            });
        }
    }

    for task in &board.tasks {
        if let Some(section_id) = &task.section_id {
            if task.is_subtask() {
                errors.push(CheckError::SubtaskWithSection {
                    task_id: task.id.clone(),
                });
            } else if board.section(section_id).is_none() {
                errors.push(CheckError::DanglingSection {
                    task_id: task.id.clone(),
                    section_id: section_id.clone(),
                });
            }
        }
        if let Some(parent_id) = &task.parent_task_id {
            match board.task(parent_id) {
                None => errors.push(CheckError::DanglingParent {
                    task_id: task.id.clone(),
                    parent_id: parent_id.clone(),
                }),
                Some(parent) if parent.is_subtask() => errors.push(CheckError::NestedSubtask {
                    task_id: task.id.clone(),
                    parent_id: parent_id.clone(),
                }),
                Some(_) => {}
            }
        }
    }

    let violations = board.violations();
    CheckResult {
        valid: errors.is_empty() && violations.is_empty(),
        errors,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnd::hit_test::DropPosition;
    use crate::io::store::MemoryStore;
    use crate::model::board::SiblingGroup;
    use pretty_assertions::assert_eq;

    /// "Now": one [one-a, one-b], two, three; unsectioned: loose
    fn store() -> MemoryStore {
        let mut store = MemoryStore::new("P");
        let now = add_section(&mut store, "Now").unwrap();
        let one = add_task(&mut store, "one", Some(&now.id)).unwrap();
        add_task(&mut store, "two", Some(&now.id)).unwrap();
        add_task(&mut store, "three", Some(&now.id)).unwrap();
        add_subtask(&mut store, &one.id, "one-a").unwrap();
        add_subtask(&mut store, &one.id, "one-b").unwrap();
        add_task(&mut store, "loose", None).unwrap();
        store
    }

    fn orders(board: &Board, group: SiblingGroup) -> Vec<(String, i64)> {
        board
            .group_ids(&group)
            .into_iter()
            .map(|id| {
                let order = board.task(&id).unwrap().display_order;
                (board.task(&id).unwrap().title.clone(), order)
            })
            .collect()
    }

    fn now() -> SiblingGroup {
        SiblingGroup::TopLevel(Some("S-001".into()))
    }

    #[test]
    fn creation_appends_to_each_group() {
        let store = store();
        let board = store.board();
        assert_eq!(
            orders(board, now()),
            vec![("one".into(), 1), ("two".into(), 2), ("three".into(), 3)]
        );
        assert_eq!(
            orders(board, SiblingGroup::Subtasks("T-001".into())),
            vec![("one-a".into(), 1), ("one-b".into(), 2)]
        );
        assert_eq!(orders(board, SiblingGroup::TopLevel(None)), vec![("loose".into(), 1)]);
    }

    #[test]
    fn blank_titles_are_rejected() {
        let mut store = store();
        assert!(matches!(add_task(&mut store, "   ", None), Err(OpsError::EmptyTitle)));
        assert!(matches!(set_title(&mut store, "T-001", ""), Err(OpsError::EmptyTitle)));
    }

    #[test]
    fn subtask_of_subtask_is_rejected() {
        let mut store = store();
        let err = add_subtask(&mut store, "T-004", "too deep").unwrap_err();
        assert!(matches!(err, OpsError::Store(StoreError::NotTopLevel(_))));
    }

    #[test]
    fn lazy_delete_leaves_gap_until_next_reorder() {
        let mut store = store();
        let dispatcher = Dispatcher::default();
        let outcome = delete_task(&mut store, &dispatcher, "T-001", false).unwrap();
        assert_eq!(outcome.removed.len(), 3);
        assert!(outcome.compacted.is_none());
        assert_eq!(
            orders(store.board(), now()),
            vec![("two".into(), 2), ("three".into(), 3)]
        );

        // The next reorder of the group renumbers it densely
        move_entity(
            &mut store,
            &dispatcher,
            "T-003",
            DropTarget::Entity {
                id: "T-002".into(),
                position: DropPosition::Before,
            },
            false,
        )
        .unwrap();
        assert_eq!(
            orders(store.board(), now()),
            vec![("three".into(), 1), ("two".into(), 2)]
        );
        assert!(check(store.board()).valid);
    }

    #[test]
    fn eager_delete_compacts_the_group() {
        let mut store = store();
        let outcome = delete_task(&mut store, &Dispatcher::default(), "T-002", true).unwrap();
        assert_eq!(outcome.compacted.unwrap().applied, 1);
        assert_eq!(
            orders(store.board(), now()),
            vec![("one".into(), 1), ("three".into(), 2)]
        );
    }

    #[test]
    fn dry_run_plans_without_writing() {
        let mut store = store();
        let outcome = move_entity(
            &mut store,
            &Dispatcher::default(),
            "T-006",
            DropTarget::SectionEnd {
                section_id: Some("S-001".into()),
            },
            true,
        )
        .unwrap();
        assert!(outcome.report.is_none());
        let ids: Vec<&str> = outcome.mutations.iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["T-006"]);
        assert_eq!(store.update_calls(), 0);
    }

    #[test]
    fn sections_move_by_id() {
        let mut store = store();
        add_section(&mut store, "Later").unwrap();
        let outcome = move_entity(
            &mut store,
            &Dispatcher::default(),
            "S-002",
            DropTarget::Entity {
                id: "S-001".into(),
                position: DropPosition::Before,
            },
            false,
        )
        .unwrap();
        assert_eq!(outcome.report.unwrap().applied, 2);
        let names: Vec<&str> = store
            .board()
            .sections_in_order()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Later", "Now"]);
    }

    #[test]
    fn unknown_move_subject() {
        let mut store = store();
        let err = move_entity(
            &mut store,
            &Dispatcher::default(),
            "X-1",
            DropTarget::None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, OpsError::NotFound(_)));
    }

    #[test]
    fn compact_fixes_every_group() {
        let mut store = store();
        let dispatcher = Dispatcher::default();
        delete_task(&mut store, &dispatcher, "T-004", false).unwrap();
        delete_task(&mut store, &dispatcher, "T-002", false).unwrap();
        assert_eq!(check(store.board()).violations.len(), 2);

        let report = compact(&mut store, &dispatcher).unwrap();
        assert_eq!(report.applied, 2);
        assert!(check(store.board()).valid);
    }

    #[test]
    fn check_reports_structural_errors() {
        let mut board = store().board().clone();
        board.tasks[0].section_id = Some("S-404".into());
        board.tasks[3].section_id = Some("S-001".into());
        board.tasks[4].parent_task_id = Some("T-004".into());
        board.sections[0].project_id = "Q".into();

        let result = check(&board);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                CheckError::ForeignProject {
                    id: "S-001".into(),
                    project_id: "Q".into()
                },
                CheckError::DanglingSection {
                    task_id: "T-001".into(),
                    section_id: "S-404".into()
                },
                CheckError::SubtaskWithSection {
                    task_id: "T-004".into()
                },
                CheckError::NestedSubtask {
                    task_id: "T-005".into(),
                    parent_id: "T-004".into()
                },
            ]
        );
    }

    #[test]
    fn check_flags_duplicates() {
        let mut board = store().board().clone();
        let copy = board.tasks[1].clone();
        board.tasks.push(copy);
        let result = check(&board);
        assert!(result.errors.contains(&CheckError::DuplicateId { id: "T-002".into() }));
        assert_eq!(result.violations.len(), 1);
    }
}
