use std::fs;
use std::path::PathBuf;

use crate::cli::commands::InitArgs;
use crate::io::board_io::FileStore;
use crate::io::project_io::{self, DATA_DIR};
use crate::io::recovery::atomic_write;
use crate::model::board::Board;

const PROJECT_TOML_TEMPLATE: &str = r##"[project]
name = {name}
# Stamped on every section and task
id = {id}

[drag]
# How far outside a row (in surface units) the pointer may be and still
# target it. The terminal UI measures in rows.
hit_slop = 20.0

[ordering]
# Renumber siblings as soon as a task is deleted. When false the gap stays
# until the next reorder touches the group (or `tl compact`).
compact_on_delete = false

[dispatch]
# "sequential": one update per changed entity, rolled back on failure
# "atomic": all updates written in one step
mode = "sequential"

[ui]
show_key_hints = true
# show_order = true

# [ui.colors]
# highlight = "#FB4196"
"##;

/// Infer a project name from a directory name: hyphens to spaces, title-case
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase, hyphen-separated id derived from a project name
fn infer_id(name: &str) -> String {
    let id: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let id = id
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if id.is_empty() { "default".to_string() } else { id }
}

fn render_project_toml(name: &str, id: &str) -> String {
    // toml::Value renders a correctly quoted and escaped string
    PROJECT_TOML_TEMPLATE
        .replace("{name}", &toml::Value::String(name.to_string()).to_string())
        .replace("{id}", &toml::Value::String(id.to_string()).to_string())
}

pub fn cmd_init(args: InitArgs, project_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let root = match project_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let data_dir = root.join(DATA_DIR);

    if data_dir.join("project.toml").exists() && !args.force {
        return Err("tasklane project already exists in ./tasklane/ (use --force to reinitialize)".into());
    }

    if let Some(parent) = root.parent()
        && let Ok(parent_root) = project_io::discover_project(parent)
    {
        eprintln!("Note: parent project found at {}/", parent_root.join(DATA_DIR).display());
        eprintln!("Creating new project in ./{}/", DATA_DIR);
    }

    let name = args.name.unwrap_or_else(|| {
        root.canonicalize()
            .ok()
            .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(infer_name))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    });
    let id = args.id.unwrap_or_else(|| infer_id(&name));

    fs::create_dir_all(&data_dir)?;
    atomic_write(
        &data_dir.join("project.toml"),
        render_project_toml(&name, &id).as_bytes(),
    )?;

    // Keep an existing board on --force; only the config is rewritten
    let board_path = FileStore::board_path(&data_dir);
    if !board_path.exists() {
        let mut content = serde_json::to_string_pretty(&Board::new(id.clone()))?;
        content.push('\n');
        atomic_write(&board_path, content.as_bytes())?;
    }

    tracing::debug!(root = %root.display(), %id, "initialized project");
    println!("Initialized tasklane project: {} ({})", name, id);
    Ok(())
}
