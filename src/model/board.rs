use serde::{Deserialize, Serialize};

/// A named section of a project's board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub project_id: String,
    pub name: String,
    /// 1-based position among the project's sections
    pub display_order: i64,
}

/// A task or (when `parent_task_id` is set) a subtask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    /// None = unsectioned. Always None for subtasks.
    #[serde(default)]
    pub section_id: Option<String>,
    /// One level of nesting only
    #[serde(default)]
    pub parent_task_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    /// 1-based position within the task's sibling group
    pub display_order: i64,
    /// Creation date, `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<String>,
}

impl Task {
    pub fn is_subtask(&self) -> bool {
        self.parent_task_id.is_some()
    }

    /// The sibling group this task currently belongs to
    pub fn group(&self) -> SiblingGroup {
        match &self.parent_task_id {
            Some(parent) => SiblingGroup::Subtasks(parent.clone()),
            None => SiblingGroup::TopLevel(self.section_id.clone()),
        }
    }
}

/// A set of entities sharing one ordering index space
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SiblingGroup {
    /// All sections of the project
    Sections,
    /// Top-level tasks of one section (None = unsectioned)
    TopLevel(Option<String>),
    /// Subtasks of one parent task
    Subtasks(String),
}

impl std::fmt::Display for SiblingGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiblingGroup::Sections => write!(f, "sections"),
            SiblingGroup::TopLevel(Some(section)) => write!(f, "tasks of {}", section),
            SiblingGroup::TopLevel(None) => write!(f, "unsectioned tasks"),
            SiblingGroup::Subtasks(parent) => write!(f, "subtasks of {}", parent),
        }
    }
}

/// Partial update for a task. `None` leaves a field untouched; for the
/// nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    /// Write the patch's fields onto a task
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(order) = self.display_order {
            task.display_order = order;
        }
        if let Some(section) = &self.section_id {
            task.section_id = section.clone();
        }
        if let Some(parent) = &self.parent_task_id {
            task.parent_task_id = parent.clone();
        }
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }

    /// Keep only the fields that would change `task`
    fn narrowed(&self, task: &Task) -> TaskPatch {
        TaskPatch {
            display_order: self.display_order.filter(|o| *o != task.display_order),
            section_id: self.section_id.clone().filter(|s| *s != task.section_id),
            parent_task_id: self
                .parent_task_id
                .clone()
                .filter(|p| *p != task.parent_task_id),
            title: self.title.clone().filter(|t| *t != task.title),
            completed: self.completed.filter(|c| *c != task.completed),
        }
    }

    /// The patch that restores the fields this patch touches
    fn inverse(&self, task: &Task) -> TaskPatch {
        TaskPatch {
            display_order: self.display_order.map(|_| task.display_order),
            section_id: self.section_id.as_ref().map(|_| task.section_id.clone()),
            parent_task_id: self
                .parent_task_id
                .as_ref()
                .map(|_| task.parent_task_id.clone()),
            title: self.title.as_ref().map(|_| task.title.clone()),
            completed: self.completed.map(|_| task.completed),
        }
    }
}

/// Partial update for a section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SectionPatch {
    pub fn is_empty(&self) -> bool {
        self == &SectionPatch::default()
    }

    pub fn apply_to(&self, section: &mut Section) {
        if let Some(order) = self.display_order {
            section.display_order = order;
        }
        if let Some(name) = &self.name {
            section.name = name.clone();
        }
    }

    fn narrowed(&self, section: &Section) -> SectionPatch {
        SectionPatch {
            display_order: self.display_order.filter(|o| *o != section.display_order),
            name: self.name.clone().filter(|n| *n != section.name),
        }
    }

    fn inverse(&self, section: &Section) -> SectionPatch {
        SectionPatch {
            display_order: self.display_order.map(|_| section.display_order),
            name: self.name.as_ref().map(|_| section.name.clone()),
        }
    }
}

/// One entity update: `{entity id, new fields}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum Mutation {
    Task { id: String, patch: TaskPatch },
    Section { id: String, patch: SectionPatch },
}

impl Mutation {
    pub fn id(&self) -> &str {
        match self {
            Mutation::Task { id, .. } | Mutation::Section { id, .. } => id,
        }
    }

    /// The same mutation reduced to the fields that differ from `board`.
    /// Returns None when nothing would change (or the entity is gone).
    pub fn narrowed(&self, board: &Board) -> Option<Mutation> {
        match self {
            Mutation::Task { id, patch } => {
                let task = board.task(id)?;
                let patch = patch.narrowed(task);
                (!patch.is_empty()).then(|| Mutation::Task {
                    id: id.clone(),
                    patch,
                })
            }
            Mutation::Section { id, patch } => {
                let section = board.section(id)?;
                let patch = patch.narrowed(section);
                (!patch.is_empty()).then(|| Mutation::Section {
                    id: id.clone(),
                    patch,
                })
            }
        }
    }

    /// True when applying this mutation to `board` changes nothing
    pub fn is_noop(&self, board: &Board) -> bool {
        self.narrowed(board).is_none()
    }

    /// The mutation that undoes this one, computed against the pre-image `board`
    pub fn inverse(&self, board: &Board) -> Option<Mutation> {
        match self {
            Mutation::Task { id, patch } => Some(Mutation::Task {
                id: id.clone(),
                patch: patch.inverse(board.task(id)?),
            }),
            Mutation::Section { id, patch } => Some(Mutation::Section {
                id: id.clone(),
                patch: patch.inverse(board.section(id)?),
            }),
        }
    }
}

/// A sibling group whose orders are not exactly `1..count`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupViolation {
    pub group: SiblingGroup,
    /// The orders found, in sorted order
    pub orders: Vec<i64>,
}

/// One visible row, in render order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    SectionHeader { id: String },
    Task {
        id: String,
        section_id: Option<String>,
        parent_task_id: Option<String>,
    },
}

/// In-memory collections of one project's sections and tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub project_id: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Board {
    pub fn new(project_id: impl Into<String>) -> Self {
        Board {
            project_id: project_id.into(),
            sections: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn section_mut(&mut self, id: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id == id)
    }

    /// Sections sorted by display order (stable on ties)
    pub fn sections_in_order(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.display_order);
        sections
    }

    /// Top-level tasks of a section (None = unsectioned), sorted by display order
    pub fn top_level(&self, section_id: Option<&str>) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.parent_task_id.is_none() && t.section_id.as_deref() == section_id)
            .collect();
        tasks.sort_by_key(|t| t.display_order);
        tasks
    }

    /// Subtasks of a parent, sorted by display order
    pub fn subtasks(&self, parent_id: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.parent_task_id.as_deref() == Some(parent_id))
            .collect();
        tasks.sort_by_key(|t| t.display_order);
        tasks
    }

    pub fn has_subtasks(&self, task_id: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.parent_task_id.as_deref() == Some(task_id))
    }

    /// Ids of a sibling group's members in display order
    pub fn group_ids(&self, group: &SiblingGroup) -> Vec<String> {
        match group {
            SiblingGroup::Sections => self
                .sections_in_order()
                .into_iter()
                .map(|s| s.id.clone())
                .collect(),
            SiblingGroup::TopLevel(section) => self
                .top_level(section.as_deref())
                .into_iter()
                .map(|t| t.id.clone())
                .collect(),
            SiblingGroup::Subtasks(parent) => self
                .subtasks(parent)
                .into_iter()
                .map(|t| t.id.clone())
                .collect(),
        }
    }

    /// Every sibling group present on the board, sections first
    pub fn groups(&self) -> Vec<SiblingGroup> {
        let mut groups = vec![SiblingGroup::Sections];
        for task in &self.tasks {
            let group = task.group();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups[1..].sort();
        groups
    }

    /// Next display order for an entity appended to `group`
    pub fn next_order(&self, group: &SiblingGroup) -> i64 {
        let max = match group {
            SiblingGroup::Sections => self.sections.iter().map(|s| s.display_order).max(),
            _ => self
                .tasks
                .iter()
                .filter(|t| &t.group() == group)
                .map(|t| t.display_order)
                .max(),
        };
        max.unwrap_or(0) + 1
    }

    /// Visible rows in render order: unsectioned tasks first, then each
    /// section header followed by its tasks; subtasks follow their parent.
    pub fn render_order(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        self.push_task_rows(None, &mut rows);
        for section in self.sections_in_order() {
            rows.push(Row::SectionHeader {
                id: section.id.clone(),
            });
            self.push_task_rows(Some(&section.id), &mut rows);
        }
        rows
    }

    fn push_task_rows(&self, section_id: Option<&str>, rows: &mut Vec<Row>) {
        for task in self.top_level(section_id) {
            rows.push(Row::Task {
                id: task.id.clone(),
                section_id: task.section_id.clone(),
                parent_task_id: None,
            });
            for sub in self.subtasks(&task.id) {
                rows.push(Row::Task {
                    id: sub.id.clone(),
                    section_id: None,
                    parent_task_id: sub.parent_task_id.clone(),
                });
            }
        }
    }

    /// Apply a mutation locally. Unknown ids are ignored.
    pub fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::Task { id, patch } => {
                if let Some(task) = self.task_mut(id) {
                    patch.apply_to(task);
                }
            }
            Mutation::Section { id, patch } => {
                if let Some(section) = self.section_mut(id) {
                    patch.apply_to(section);
                }
            }
        }
    }

    /// Sibling groups whose orders are not the dense sequence `1..count`
    pub fn violations(&self) -> Vec<GroupViolation> {
        let mut out = Vec::new();
        for group in self.groups() {
            let mut orders: Vec<i64> = match &group {
                SiblingGroup::Sections => self.sections.iter().map(|s| s.display_order).collect(),
                _ => self
                    .tasks
                    .iter()
                    .filter(|t| t.group() == group)
                    .map(|t| t.display_order)
                    .collect(),
            };
            orders.sort_unstable();
            let dense = orders.iter().zip(1..).all(|(o, expected)| *o == expected);
            if !dense {
                out.push(GroupViolation { group, orders });
            }
        }
        out
    }
}
