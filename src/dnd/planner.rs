//! Reorder planning: turn a finished drag into entity mutations.
//!
//! Planning is pure. Each plan carries the full new ordering fields for
//! every member of every sibling group the move touches; the dispatcher
//! later drops entries that would not change anything.

use serde::Serialize;

use super::hit_test::{DragSubject, DropPosition, DropTarget};
use crate::model::board::{Board, Mutation, SectionPatch, SiblingGroup, TaskPatch};

/// Error type for reorder planning
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("task not found: {0}")]
    UnknownTask(String),
    #[error("section not found: {0}")]
    UnknownSection(String),
    #[error("cannot drop {subject} next to {target}: {reason}")]
    InvalidTarget {
        subject: String,
        target: String,
        reason: &'static str,
    },
    #[error("{0} has subtasks of its own and cannot become a subtask")]
    NestingTooDeep(String),
}

/// The mutations realizing one move
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub mutations: Vec<Mutation>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// The mutations that change something on `board`, narrowed to the
    /// changed fields
    pub fn effective(&self, board: &Board) -> Vec<Mutation> {
        self.mutations
            .iter()
            .filter_map(|m| m.narrowed(board))
            .collect()
    }
}

/// Plan the mutations for dropping `subject` on `target`.
///
/// The dragged entity is looked up on `board`; the subject's own placement
/// fields are only used by the hit-tester.
pub fn plan_drop(
    subject: &DragSubject,
    target: &DropTarget,
    board: &Board,
) -> Result<Plan, PlanError> {
    match subject {
        DragSubject::Section { id } => plan_section_drop(id, target, board),
        DragSubject::Task { id, .. } => plan_task_drop(id, target, board),
    }
}

fn plan_section_drop(id: &str, target: &DropTarget, board: &Board) -> Result<Plan, PlanError> {
    if board.section(id).is_none() {
        return Err(PlanError::UnknownSection(id.to_string()));
    }
    let (target_id, position) = match target {
        DropTarget::None => return Ok(Plan::default()),
        DropTarget::SectionEnd { section_id } => {
            return Err(PlanError::InvalidTarget {
                subject: id.to_string(),
                target: section_id.clone().unwrap_or_else(|| "unsectioned".into()),
                reason: "sections are reordered next to other sections",
            });
        }
        DropTarget::Entity { id, position } => (id.as_str(), *position),
    };
    if target_id == id {
        return Ok(Plan::default());
    }
    if board.section(target_id).is_none() {
        if board.task(target_id).is_some() {
            return Err(PlanError::InvalidTarget {
                subject: id.to_string(),
                target: target_id.to_string(),
                reason: "sections are reordered next to other sections",
            });
        }
        return Err(PlanError::UnknownSection(target_id.to_string()));
    }

    let order = splice(board.group_ids(&SiblingGroup::Sections), id, target_id, position);
    let mutations = order
        .into_iter()
        .zip(1..)
        .map(|(section_id, n)| Mutation::Section {
            id: section_id,
            patch: SectionPatch {
                display_order: Some(n),
                ..Default::default()
            },
        })
        .collect();
    Ok(Plan { mutations })
}

/// Where the dragged task ends up
struct Placement {
    group: SiblingGroup,
    section_id: Option<String>,
    parent_task_id: Option<String>,
    /// Member ids of the destination group in their new order
    order: Vec<String>,
}

fn plan_task_drop(id: &str, target: &DropTarget, board: &Board) -> Result<Plan, PlanError> {
    let dragged = board
        .task(id)
        .ok_or_else(|| PlanError::UnknownTask(id.to_string()))?;
    let source = dragged.group();

    let placement = match target {
        DropTarget::None => return Ok(Plan::default()),
        DropTarget::SectionEnd { section_id } => {
            if let Some(section) = section_id
                && board.section(section).is_none()
            {
                return Err(PlanError::UnknownSection(section.clone()));
            }
            // Case 1: append to the end of the section's top-level list
            let group = SiblingGroup::TopLevel(section_id.clone());
            let mut order = board.group_ids(&group);
            order.retain(|t| t != id);
            order.push(id.to_string());
            Placement {
                group,
                section_id: section_id.clone(),
                parent_task_id: None,
                order,
            }
        }
        DropTarget::Entity {
            id: target_id,
            position,
        } => {
            if target_id == id {
                return Ok(Plan::default());
            }
            let target_task = board.task(target_id).ok_or_else(|| {
                if board.section(target_id).is_some() {
                    PlanError::InvalidTarget {
                        subject: id.to_string(),
                        target: target_id.clone(),
                        reason: "tasks are dropped next to tasks or into a section",
                    }
                } else {
                    PlanError::UnknownTask(target_id.clone())
                }
            })?;

            let (section_id, parent_task_id) =
                match (&dragged.parent_task_id, &target_task.parent_task_id) {
                    // Case 3: reorder among siblings
                    (Some(own), Some(other)) => {
                        if own != other {
                            return Err(PlanError::InvalidTarget {
                                subject: id.to_string(),
                                target: target_id.clone(),
                                reason: "subtasks are reordered within their own parent",
                            });
                        }
                        (None, Some(own.clone()))
                    }
                    // Case 2: promotion into the target's section
                    (Some(_), None) => (target_task.section_id.clone(), None),
                    // Case 4: demotion under the target's parent
                    (None, Some(other)) => {
                        if other == id {
                            return Err(PlanError::InvalidTarget {
                                subject: id.to_string(),
                                target: target_id.clone(),
                                reason: "a task cannot become a subtask of itself",
                            });
                        }
                        if board.has_subtasks(id) {
                            return Err(PlanError::NestingTooDeep(id.to_string()));
                        }
                        (None, Some(other.clone()))
                    }
                    // Case 5: top-level reorder, possibly across sections
                    (None, None) => (target_task.section_id.clone(), None),
                };

            let group = target_task.group();
            let order = splice(board.group_ids(&group), id, target_id, *position);
            Placement {
                group,
                section_id,
                parent_task_id,
                order,
            }
        }
    };

    let mut mutations = Vec::new();
    if source != placement.group {
        let remaining: Vec<String> = board
            .group_ids(&source)
            .into_iter()
            .filter(|t| t != id)
            .collect();
        push_task_orders(&mut mutations, remaining);
    }
    for (task_id, n) in placement.order.into_iter().zip(1..) {
        let mut patch = TaskPatch {
            display_order: Some(n),
            ..Default::default()
        };
        if task_id == id {
            patch.section_id = Some(placement.section_id.clone());
            patch.parent_task_id = Some(placement.parent_task_id.clone());
        }
        mutations.push(Mutation::Task { id: task_id, patch });
    }
    Ok(Plan { mutations })
}

/// Remove `dragged` from `ids` and reinsert it next to `target`.
/// "Before" lands on the target's index in the post-removal list, "after"
/// one past it.
fn splice(mut ids: Vec<String>, dragged: &str, target: &str, position: DropPosition) -> Vec<String> {
    ids.retain(|id| id != dragged);
    let target_idx = ids.iter().position(|id| id == target).unwrap_or(ids.len());
    let idx = match position {
        DropPosition::Before => target_idx,
        DropPosition::After => (target_idx + 1).min(ids.len()),
    };
    ids.insert(idx, dragged.to_string());
    ids
}

fn push_task_orders(mutations: &mut Vec<Mutation>, ids: Vec<String>) {
    for (id, n) in ids.into_iter().zip(1..) {
        mutations.push(Mutation::Task {
            id,
            patch: TaskPatch {
                display_order: Some(n),
                ..Default::default()
            },
        });
    }
}

/// Renumber one sibling group densely in its current order
pub fn plan_compaction(board: &Board, group: &SiblingGroup) -> Plan {
    let ids = board.group_ids(group);
    let mut mutations = Vec::new();
    match group {
        SiblingGroup::Sections => {
            for (id, n) in ids.into_iter().zip(1..) {
                mutations.push(Mutation::Section {
                    id,
                    patch: SectionPatch {
                        display_order: Some(n),
                        ..Default::default()
                    },
                });
            }
        }
        _ => push_task_orders(&mut mutations, ids),
    }
    Plan { mutations }
}

/// Renumber every sibling group on the board
pub fn plan_full_compaction(board: &Board) -> Plan {
    let mutations = board
        .groups()
        .iter()
        .flat_map(|group| plan_compaction(board, group).mutations)
        .collect();
    Plan { mutations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::board::{Section, Task};
    use pretty_assertions::assert_eq;

    fn task(id: &str, section: Option<&str>, parent: Option<&str>, order: i64) -> Task {
        Task {
            id: id.into(),
            project_id: "P".into(),
            section_id: section.map(String::from),
            parent_task_id: parent.map(String::from),
            title: id.into(),
            completed: false,
            display_order: order,
            added: None,
        }
    }

    fn section(id: &str, order: i64) -> Section {
        Section {
            id: id.into(),
            project_id: "P".into(),
            name: id.into(),
            display_order: order,
        }
    }

    /// S1: A(1) [A1, A2, A3], B(2), C(3)
    /// S2: T1(1), T2(2) [T2a]
    /// S3: (empty)
    /// unsectioned: U(1)
    fn board() -> Board {
        Board {
            project_id: "P".into(),
            sections: vec![section("S1", 1), section("S2", 2), section("S3", 3)],
            tasks: vec![
                task("A", Some("S1"), None, 1),
                task("B", Some("S1"), None, 2),
                task("C", Some("S1"), None, 3),
                task("A1", None, Some("A"), 1),
                task("A2", None, Some("A"), 2),
                task("A3", None, Some("A"), 3),
                task("T1", Some("S2"), None, 1),
                task("T2", Some("S2"), None, 2),
                task("T2a", None, Some("T2"), 1),
                task("U", None, None, 1),
            ],
        }
    }

    fn subject(board: &Board, id: &str) -> DragSubject {
        let key = if board.section(id).is_some() {
            crate::dnd::geometry::GeometryKey::Section(id.into())
        } else {
            crate::dnd::geometry::GeometryKey::Task(id.into())
        };
        DragSubject::from_board(board, &key).unwrap()
    }

    fn before(id: &str) -> DropTarget {
        DropTarget::Entity {
            id: id.into(),
            position: DropPosition::Before,
        }
    }

    fn after(id: &str) -> DropTarget {
        DropTarget::Entity {
            id: id.into(),
            position: DropPosition::After,
        }
    }

    /// Plan, apply, and return the board afterwards
    fn drop_on(board: &Board, id: &str, target: DropTarget) -> Board {
        let plan = plan_drop(&subject(board, id), &target, board).unwrap();
        let mut out = board.clone();
        for m in plan.effective(board) {
            out.apply(&m);
        }
        assert!(out.violations().is_empty(), "{:?}", out.violations());
        out
    }

    fn ids(tasks: Vec<&Task>) -> Vec<(String, i64)> {
        tasks
            .into_iter()
            .map(|t| (t.id.clone(), t.display_order))
            .collect()
    }

    fn pairs(items: &[(&str, i64)]) -> Vec<(String, i64)> {
        items.iter().map(|(id, n)| (id.to_string(), *n)).collect()
    }

    #[test]
    fn reorder_before_within_section() {
        // [A, B, C]: drag C before B → [A, C, B]
        let out = drop_on(&board(), "C", before("B"));
        assert_eq!(
            ids(out.top_level(Some("S1"))),
            pairs(&[("A", 1), ("C", 2), ("B", 3)])
        );
    }

    #[test]
    fn reorder_after_within_section() {
        let out = drop_on(&board(), "A", after("B"));
        assert_eq!(
            ids(out.top_level(Some("S1"))),
            pairs(&[("B", 1), ("A", 2), ("C", 3)])
        );
    }

    #[test]
    fn plan_carries_whole_group_but_effective_skips_unchanged() {
        let b = board();
        let plan = plan_drop(&subject(&b, "C"), &before("B"), &b).unwrap();
        assert_eq!(plan.len(), 3);
        let effective = plan.effective(&b);
        let touched: Vec<&str> = effective.iter().map(|m| m.id()).collect();
        assert_eq!(touched, vec!["C", "B"]);
    }

    #[test]
    fn cross_section_move_renumbers_both_sections() {
        let out = drop_on(&board(), "A", before("T2"));
        assert_eq!(ids(out.top_level(Some("S1"))), pairs(&[("B", 1), ("C", 2)]));
        assert_eq!(
            ids(out.top_level(Some("S2"))),
            pairs(&[("T1", 1), ("A", 2), ("T2", 3)])
        );
        assert_eq!(out.task("A").unwrap().section_id.as_deref(), Some("S2"));
        // Subtasks travel with their parent
        assert_eq!(out.subtasks("A").len(), 3);
    }

    #[test]
    fn promotion_after_top_level_task() {
        // Subtask A2 dropped after T2 in S2
        let out = drop_on(&board(), "A2", after("T2"));
        let a2 = out.task("A2").unwrap();
        assert_eq!(a2.parent_task_id, None);
        assert_eq!(a2.section_id.as_deref(), Some("S2"));
        assert_eq!(
            ids(out.top_level(Some("S2"))),
            pairs(&[("T1", 1), ("T2", 2), ("A2", 3)])
        );
        assert_eq!(ids(out.subtasks("A")), pairs(&[("A1", 1), ("A3", 2)]));
    }

    #[test]
    fn promotion_into_unsectioned_group() {
        let out = drop_on(&board(), "A1", before("U"));
        let a1 = out.task("A1").unwrap();
        assert_eq!(a1.parent_task_id, None);
        assert_eq!(a1.section_id, None);
        assert_eq!(ids(out.top_level(None)), pairs(&[("A1", 1), ("U", 2)]));
        assert_eq!(ids(out.subtasks("A")), pairs(&[("A2", 1), ("A3", 2)]));
    }

    #[test]
    fn subtask_reorder_within_parent() {
        let out = drop_on(&board(), "A3", before("A1"));
        assert_eq!(
            ids(out.subtasks("A")),
            pairs(&[("A3", 1), ("A1", 2), ("A2", 3)])
        );
    }

    #[test]
    fn subtask_onto_other_parents_subtask_is_rejected() {
        let b = board();
        let err = plan_drop(&subject(&b, "A1"), &before("T2a"), &b).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTarget { .. }));
    }

    #[test]
    fn demotion_under_target_parent() {
        // C dropped after A1 becomes a subtask of A
        let out = drop_on(&board(), "C", after("A1"));
        let c = out.task("C").unwrap();
        assert_eq!(c.parent_task_id.as_deref(), Some("A"));
        assert_eq!(c.section_id, None);
        assert_eq!(
            ids(out.subtasks("A")),
            pairs(&[("A1", 1), ("C", 2), ("A2", 3), ("A3", 4)])
        );
        assert_eq!(ids(out.top_level(Some("S1"))), pairs(&[("A", 1), ("B", 2)]));
    }

    #[test]
    fn demotion_of_task_with_subtasks_is_rejected() {
        let b = board();
        let err = plan_drop(&subject(&b, "T2"), &before("A1"), &b).unwrap_err();
        assert_eq!(err, PlanError::NestingTooDeep("T2".into()));
    }

    #[test]
    fn demotion_onto_own_subtask_is_rejected() {
        let b = board();
        let err = plan_drop(&subject(&b, "A"), &before("A2"), &b).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTarget { .. }));
    }

    #[test]
    fn section_end_appends_to_empty_section() {
        let out = drop_on(
            &board(),
            "B",
            DropTarget::SectionEnd {
                section_id: Some("S3".into()),
            },
        );
        assert_eq!(ids(out.top_level(Some("S3"))), pairs(&[("B", 1)]));
        assert_eq!(ids(out.top_level(Some("S1"))), pairs(&[("A", 1), ("C", 2)]));
    }

    #[test]
    fn section_end_promotes_subtask() {
        let out = drop_on(
            &board(),
            "A1",
            DropTarget::SectionEnd {
                section_id: Some("S2".into()),
            },
        );
        assert_eq!(
            ids(out.top_level(Some("S2"))),
            pairs(&[("T1", 1), ("T2", 2), ("A1", 3)])
        );
        assert_eq!(out.task("A1").unwrap().parent_task_id, None);
        assert_eq!(ids(out.subtasks("A")), pairs(&[("A2", 1), ("A3", 2)]));
    }

    #[test]
    fn section_end_of_own_section_moves_to_bottom() {
        let out = drop_on(
            &board(),
            "A",
            DropTarget::SectionEnd {
                section_id: Some("S1".into()),
            },
        );
        assert_eq!(
            ids(out.top_level(Some("S1"))),
            pairs(&[("B", 1), ("C", 2), ("A", 3)])
        );
    }

    #[test]
    fn section_end_closes_existing_gaps() {
        let mut b = board();
        b.tasks.retain(|t| t.id != "T1");
        let out = drop_on(
            &b,
            "C",
            DropTarget::SectionEnd {
                section_id: Some("S2".into()),
            },
        );
        assert_eq!(ids(out.top_level(Some("S2"))), pairs(&[("T2", 1), ("C", 2)]));
    }

    #[test]
    fn section_reorder() {
        let out = drop_on(&board(), "S3", before("S1"));
        let order: Vec<(String, i64)> = out
            .sections_in_order()
            .into_iter()
            .map(|s| (s.id.clone(), s.display_order))
            .collect();
        assert_eq!(order, pairs(&[("S3", 1), ("S1", 2), ("S2", 3)]));
    }

    #[test]
    fn section_reorder_after() {
        let order = |b: &Board| -> Vec<(String, i64)> {
            b.sections_in_order()
                .into_iter()
                .map(|s| (s.id.clone(), s.display_order))
                .collect()
        };
        let out = drop_on(&board(), "S1", after("S3"));
        assert_eq!(order(&out), pairs(&[("S2", 1), ("S3", 2), ("S1", 3)]));

        let out = drop_on(&board(), "S3", after("S1"));
        assert_eq!(order(&out), pairs(&[("S1", 1), ("S3", 2), ("S2", 3)]));

        // Already right after the target
        let b = board();
        let plan = plan_drop(&subject(&b, "S2"), &after("S1"), &b).unwrap();
        assert!(plan.effective(&b).is_empty());
    }

    #[test]
    fn section_targets_must_be_sections() {
        let b = board();
        let s1 = subject(&b, "S1");
        assert!(matches!(
            plan_drop(&s1, &after("A"), &b),
            Err(PlanError::InvalidTarget { .. })
        ));
        assert!(matches!(
            plan_drop(&s1, &DropTarget::SectionEnd { section_id: None }, &b),
            Err(PlanError::InvalidTarget { .. })
        ));
        assert_eq!(
            plan_drop(&s1, &after("S9"), &b),
            Err(PlanError::UnknownSection("S9".into()))
        );
    }

    #[test]
    fn no_target_or_self_target_is_empty() {
        let b = board();
        assert!(plan_drop(&subject(&b, "A"), &DropTarget::None, &b).unwrap().is_empty());
        assert!(plan_drop(&subject(&b, "A"), &before("A"), &b).unwrap().is_empty());
        assert!(plan_drop(&subject(&b, "S1"), &after("S1"), &b).unwrap().is_empty());
    }

    #[test]
    fn unknown_entities() {
        let b = board();
        let ghost = DragSubject::Task {
            id: "ghost".into(),
            section_id: None,
            parent_task_id: None,
            has_subtasks: false,
        };
        assert_eq!(
            plan_drop(&ghost, &before("A"), &b),
            Err(PlanError::UnknownTask("ghost".into()))
        );
        assert_eq!(
            plan_drop(&subject(&b, "A"), &before("nope"), &b),
            Err(PlanError::UnknownTask("nope".into()))
        );
        assert_eq!(
            plan_drop(
                &subject(&b, "A"),
                &DropTarget::SectionEnd {
                    section_id: Some("S9".into())
                },
                &b
            ),
            Err(PlanError::UnknownSection("S9".into()))
        );
    }

    #[test]
    fn compaction_closes_gaps() {
        let mut b = board();
        b.tasks.retain(|t| t.id != "A2" && t.id != "B");
        assert_eq!(b.violations().len(), 2);

        let group = SiblingGroup::Subtasks("A".into());
        let plan = plan_compaction(&b, &group);
        assert_eq!(plan.effective(&b).len(), 1);

        let plan = plan_full_compaction(&b);
        for m in plan.effective(&b) {
            b.apply(&m);
        }
        assert!(b.violations().is_empty());
        assert_eq!(ids(b.top_level(Some("S1"))), pairs(&[("A", 1), ("C", 2)]));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use proptest::sample::Index;

        /// Build a dense board from (section pick, parent pick) pairs
        fn build(sections: usize, specs: &[(usize, Option<usize>)]) -> Board {
            let mut b = Board::new("P");
            for i in 0..sections {
                b.sections.push(section(&format!("S{}", i), i as i64 + 1));
            }
            for (i, (section_pick, parent_pick)) in specs.iter().enumerate() {
                let top: Vec<String> = b
                    .tasks
                    .iter()
                    .filter(|t| t.parent_task_id.is_none())
                    .map(|t| t.id.clone())
                    .collect();
                let id = format!("T{}", i);
                let mut t = match parent_pick {
                    Some(p) if !top.is_empty() => {
                        task(&id, None, Some(top[p % top.len()].as_str()), 0)
                    }
                    _ => {
                        let pick = section_pick % (sections + 1);
                        let sid = (pick < sections).then(|| format!("S{}", pick));
                        task(&id, sid.as_deref(), None, 0)
                    }
                };
                t.display_order = b.next_order(&t.group());
                b.tasks.push(t);
            }
            b
        }

        proptest! {
            #[test]
            fn drops_keep_groups_dense_and_place_adjacent(
                sections in 1usize..4,
                specs in prop::collection::vec((0usize..5, prop::option::of(0usize..6)), 2..14),
                dragged in any::<Index>(),
                target in any::<Index>(),
                before_target in any::<bool>(),
            ) {
                let b = build(sections, &specs);
                let dragged = b.tasks[dragged.index(b.tasks.len())].id.clone();
                let target_id = b.tasks[target.index(b.tasks.len())].id.clone();
                prop_assume!(dragged != target_id);
                let position = if before_target { DropPosition::Before } else { DropPosition::After };
                let drop = DropTarget::Entity { id: target_id.clone(), position };

                let Ok(plan) = plan_drop(&subject(&b, &dragged), &drop, &b) else {
                    return Ok(());
                };
                let mut out = b.clone();
                for m in plan.effective(&b) {
                    out.apply(&m);
                }
                prop_assert!(out.violations().is_empty());

                let group = out.task(&dragged).unwrap().group();
                prop_assert_eq!(&group, &out.task(&target_id).unwrap().group());
                let order = out.group_ids(&group);
                let d = order.iter().position(|t| *t == dragged).unwrap();
                let t = order.iter().position(|x| *x == target_id).unwrap();
                match position {
                    DropPosition::Before => prop_assert_eq!(d + 1, t),
                    DropPosition::After => prop_assert_eq!(d, t + 1),
                }
            }

            #[test]
            fn section_drops_keep_sections_dense_and_adjacent(
                sections in 2usize..7,
                dragged in any::<Index>(),
                target in any::<Index>(),
                before_target in any::<bool>(),
            ) {
                let b = build(sections, &[]);
                let dragged = format!("S{}", dragged.index(sections));
                let target_id = format!("S{}", target.index(sections));
                prop_assume!(dragged != target_id);
                let position = if before_target { DropPosition::Before } else { DropPosition::After };
                let drop = DropTarget::Entity { id: target_id.clone(), position };

                let plan = plan_drop(&subject(&b, &dragged), &drop, &b).unwrap();
                let mut out = b.clone();
                for m in plan.effective(&b) {
                    out.apply(&m);
                }
                prop_assert!(out.violations().is_empty());

                let order = out.group_ids(&SiblingGroup::Sections);
                prop_assert_eq!(order.len(), sections);
                let d = order.iter().position(|s| *s == dragged).unwrap();
                let t = order.iter().position(|s| *s == target_id).unwrap();
                match position {
                    DropPosition::Before => prop_assert_eq!(d + 1, t),
                    DropPosition::After => prop_assert_eq!(d, t + 1),
                }
            }
        }
    }
}
