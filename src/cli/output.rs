use serde::Serialize;

use crate::dnd::hit_test::{DropPosition, DropTarget};
use crate::model::board::{Board, GroupViolation, Mutation, Task};
use crate::ops::board_ops::CheckError;
use crate::ops::replay::StepResult;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub display_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct SectionJson {
    pub id: String,
    pub name: String,
    pub display_order: i64,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct BoardJson {
    pub project_id: String,
    pub unsectioned: Vec<TaskJson>,
    pub sections: Vec<SectionJson>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(board: &Board, task: &Task) -> TaskJson {
    TaskJson {
        id: task.id.clone(),
        title: task.title.clone(),
        completed: task.completed,
        display_order: task.display_order,
        added: task.added.clone(),
        subtasks: board
            .subtasks(&task.id)
            .into_iter()
            .map(|sub| task_to_json(board, sub))
            .collect(),
    }
}

pub fn board_to_json(board: &Board) -> BoardJson {
    let tasks = |section: Option<&str>| -> Vec<TaskJson> {
        board
            .top_level(section)
            .into_iter()
            .map(|t| task_to_json(board, t))
            .collect()
    };
    BoardJson {
        project_id: board.project_id.clone(),
        unsectioned: tasks(None),
        sections: board
            .sections_in_order()
            .into_iter()
            .map(|s| SectionJson {
                id: s.id.clone(),
                name: s.name.clone(),
                display_order: s.display_order,
                tasks: tasks(Some(&s.id)),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Which part of the board `tl list` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope<'a> {
    All,
    Unsectioned,
    Section(&'a str),
}

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task, show_order: bool) -> String {
    let check = if task.completed { 'x' } else { ' ' };
    if show_order {
        format!("[{}] {} {}  ({})", check, task.id, task.title, task.display_order)
    } else {
        format!("[{}] {} {}", check, task.id, task.title)
    }
}

fn push_task_tree(lines: &mut Vec<String>, board: &Board, section: Option<&str>, show_order: bool) {
    for task in board.top_level(section) {
        lines.push(format_task_line(task, show_order));
        for sub in board.subtasks(&task.id) {
            lines.push(format!("  {}", format_task_line(sub, show_order)));
        }
    }
}

/// Render order listing: unsectioned tasks, then each section with its tasks
pub fn format_board_listing(board: &Board, scope: ListScope<'_>, show_order: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if matches!(scope, ListScope::All | ListScope::Unsectioned) {
        push_task_tree(&mut lines, board, None, show_order);
    }
    for section in board.sections_in_order() {
        let wanted = match scope {
            ListScope::All => true,
            ListScope::Unsectioned => false,
            ListScope::Section(id) => id == section.id,
        };
        if !wanted {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        if show_order {
            lines.push(format!("== {} ({})  ({}) ==", section.name, section.id, section.display_order));
        } else {
            lines.push(format!("== {} ({}) ==", section.name, section.id));
        }
        push_task_tree(&mut lines, board, Some(&section.id), show_order);
    }
    lines
}

/// One line per mutation, e.g. `T-003  order=2 section=S-002 parent=-`
pub fn format_mutation(mutation: &Mutation) -> String {
    let mut parts = vec![mutation.id().to_string()];
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    match mutation {
        Mutation::Task { patch, .. } => {
            if let Some(order) = patch.display_order {
                parts.push(format!("order={}", order));
            }
            if let Some(section) = &patch.section_id {
                parts.push(format!("section={}", opt(section)));
            }
            if let Some(parent) = &patch.parent_task_id {
                parts.push(format!("parent={}", opt(parent)));
            }
            if let Some(title) = &patch.title {
                parts.push(format!("title={:?}", title));
            }
            if let Some(completed) = patch.completed {
                parts.push(format!("completed={}", completed));
            }
        }
        Mutation::Section { patch, .. } => {
            if let Some(order) = patch.display_order {
                parts.push(format!("order={}", order));
            }
            if let Some(name) = &patch.name {
                parts.push(format!("name={:?}", name));
            }
        }
    }
    parts.join(" ")
}

/// `before T-001`, `end of S-002`, `end of unsectioned`
pub fn format_target(target: &DropTarget) -> String {
    match target {
        DropTarget::None => "nowhere".to_string(),
        DropTarget::Entity {
            id,
            position: DropPosition::Before,
        } => format!("before {}", id),
        DropTarget::Entity {
            id,
            position: DropPosition::After,
        } => format!("after {}", id),
        DropTarget::SectionEnd {
            section_id: Some(id),
        } => format!("end of {}", id),
        DropTarget::SectionEnd { section_id: None } => "end of unsectioned".to_string(),
    }
}

/// One line per replayed pointer event
pub fn format_step(step: &StepResult) -> String {
    match step {
        StepResult::Down { subject: Some(s) } => format!("down  {}", s),
        StepResult::Down { subject: None } => "down  (no handle)".to_string(),
        StepResult::Move { target: Some(t) } => format!("move  {}", format_target(t)),
        StepResult::Move { target: None } => "move  (not dragging)".to_string(),
        StepResult::Up { outcome } => format!(
            "up    {} {}: {} applied, {} skipped",
            outcome.subject.id(),
            format_target(&outcome.target),
            outcome.report.applied,
            outcome.report.skipped
        ),
        StepResult::Cancel { cancelled } => {
            if *cancelled {
                "cancel".to_string()
            } else {
                "cancel (not dragging)".to_string()
            }
        }
        StepResult::Error { message } => format!("error {}", message),
    }
}

pub fn format_check_error(err: &CheckError) -> String {
    match err {
        CheckError::DuplicateId { id } => format!("{} is used more than once", id),
        CheckError::DanglingSection {
            task_id,
            section_id,
        } => format!("{} is in missing section {}", task_id, section_id),
        CheckError::DanglingParent { task_id, parent_id } => {
            format!("{} has missing parent {}", task_id, parent_id)
        }
        CheckError::NestedSubtask { task_id, parent_id } => {
            format!("{} is nested under subtask {}", task_id, parent_id)
        }
        CheckError::SubtaskWithSection { task_id } => {
            format!("{} is a subtask but also has a section", task_id)
        }
        CheckError::ForeignProject { id, project_id } => {
            format!("{} belongs to project {}", id, project_id)
        }
    }
}

pub fn format_violation(v: &GroupViolation) -> String {
    let orders: Vec<String> = v.orders.iter().map(|o| o.to_string()).collect();
    format!("{}: orders [{}]", v.group, orders.join(", "))
}
