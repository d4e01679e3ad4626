use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration from project.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectInfo,
    #[serde(default)]
    pub drag: DragConfig,
    #[serde(default)]
    pub ordering: OrderingConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    /// Stamped onto every section and task as `project_id`
    #[serde(default = "default_project_id")]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DragConfig {
    /// How far above a row's top edge (or below its bottom edge) the pointer
    /// may be and still resolve to that row.
    #[serde(default = "default_hit_slop")]
    pub hit_slop: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        DragConfig {
            hit_slop: default_hit_slop(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Renumber a sibling group as soon as one of its members is deleted.
    /// When false the gap stays until the next reorder touches the group.
    #[serde(default)]
    pub compact_on_delete: bool,
}

/// How planned mutations reach the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One call per changed entity, rolled back on the first failure
    #[default]
    Sequential,
    /// All changed entities in one store request
    Atomic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub show_key_hints: bool,
    /// Show each row's display order next to its title
    #[serde(default)]
    pub show_order: bool,
    /// Color overrides for the terminal UI, e.g. `highlight = "#FB4196"`
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            show_key_hints: true,
            show_order: false,
            colors: HashMap::new(),
        }
    }
}

/// Default: see the project.toml template in cli/handlers/init.rs
fn default_true() -> bool {
    true
}

/// Default: see the project.toml template in cli/handlers/init.rs
fn default_hit_slop() -> f64 {
    20.0
}

fn default_project_id() -> String {
    "default".to_string()
}
