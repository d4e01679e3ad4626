mod init;
pub use init::cmd_init;

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::dnd::dispatch::{DispatchError, Dispatcher};
use crate::dnd::controller::DragController;
use crate::dnd::hit_test::{DropPosition, DropTarget};
use crate::io::board_io::FileStore;
use crate::io::lock::FileLock;
use crate::io::project_io::{self, ProjectError};
use crate::io::recovery;
use crate::io::store::TaskStore;
use crate::model::project::Project;
use crate::ops::board_ops::{self, CheckResult, OpsError};
use crate::ops::replay::{self, Script};

/// Project directory given with -C, resolved once per process
static PROJECT_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    if let Some(ref dir) = cli.project_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        let _ = PROJECT_DIR_OVERRIDE.set(abs);
    }

    match cli.command {
        None => Err("no subcommand given (try `tl --help`)".into()),
        Some(cmd) => match cmd {
            // Init is normally routed by main.rs before project discovery
            Commands::Init(args) => cmd_init(args, cli.project_dir.as_deref()),

            // Read commands
            Commands::List(args) => cmd_list(args, json),
            Commands::Check => cmd_check(json),

            // Write commands
            Commands::Section(cmd) => cmd_section(cmd, json),
            Commands::Add(args) => cmd_add(args, json),
            Commands::Sub(args) => cmd_sub(args, json),
            Commands::Rm(args) => cmd_rm(args, json),
            Commands::Done(args) => cmd_done(args, json),
            Commands::Title(args) => cmd_title(args, json),
            Commands::Mv(args) => cmd_mv(args, json),
            Commands::Compact => cmd_compact(json),
            Commands::Replay(args) => cmd_replay(args, json),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_project_cwd() -> Result<Project, ProjectError> {
    let start = match PROJECT_DIR_OVERRIDE.get() {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(ProjectError::IoError)?,
    };
    let root = project_io::discover_project(&start)?;
    project_io::load_project(&root)
}

fn open_store(project: &Project) -> FileStore {
    FileStore::open(&project.data_dir, &project.config.project.id)
}

fn dispatcher_for(project: &Project) -> Dispatcher {
    Dispatcher::new(project.config.dispatch.mode)
}

/// Record mutations a failed rollback left behind, then pass the error on
fn note_divergence(project: &Project, err: OpsError) -> Box<dyn std::error::Error> {
    if let OpsError::Dispatch(ref dispatch_err) = err
        && dispatch_err.diverged()
        && let DispatchError::Failed { stranded, .. } = dispatch_err
    {
        recovery::log_stranded_mutations(&project.data_dir, &dispatch_err.to_string(), stranded);
        eprintln!(
            "warning: board may be partially updated; see {}",
            recovery::recovery_log_path(&project.data_dir).display()
        );
    }
    err.into()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let board = open_store(&project).load_board()?;

    let scope = match args.section.as_deref() {
        None => ListScope::All,
        Some("-") => ListScope::Unsectioned,
        Some(id) => {
            if board.section(id).is_none() {
                return Err(format!("section not found: {}", id).into());
            }
            ListScope::Section(id)
        }
    };

    if json {
        let all = board_to_json(&board);
        return match scope {
            ListScope::All => print_json(&all),
            ListScope::Unsectioned => print_json(&all.unsectioned),
            ListScope::Section(id) => {
                let section = all.sections.iter().find(|s| s.id == id);
                print_json(&section)
            }
        };
    }

    let show_order = args.order || project.config.ui.show_order;
    for line in format_board_listing(&board, scope, show_order) {
        println!("{}", line);
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckJson<'a> {
    #[serde(flatten)]
    result: &'a CheckResult,
    recovery_entries: usize,
}

fn cmd_check(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let board = open_store(&project).load_board()?;
    let result = board_ops::check(&board);
    let recovery_entries = recovery::recovery_entry_count(&project.data_dir);

    if json {
        print_json(&CheckJson {
            result: &result,
            recovery_entries,
        })?;
    } else {
        if !result.errors.is_empty() {
            println!("Errors:");
            for err in &result.errors {
                println!("  {}", format_check_error(err));
            }
        }
        if !result.violations.is_empty() {
            if !result.errors.is_empty() {
                println!();
            }
            println!("Ordering gaps (run `tl compact` to renumber):");
            for v in &result.violations {
                println!("  {}", format_violation(v));
            }
        }
        if recovery_entries > 0 {
            println!(
                "{} recovery log entr{} in {}",
                recovery_entries,
                if recovery_entries == 1 { "y" } else { "ies" },
                recovery::recovery_log_path(&project.data_dir).display()
            );
        }
        if result.valid {
            println!("✓ board is valid");
        } else if result.errors.is_empty() {
            println!("✓ board structure is valid");
        } else {
            println!("✗ board has errors");
        }
    }

    if result.errors.is_empty() {
        Ok(())
    } else {
        Err(format!("{} structural error(s)", result.errors.len()).into())
    }
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_section(cmd: SectionCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    match cmd.action {
        SectionAction::Add(args) => {
            let section = board_ops::add_section(&mut store, &args.name)?;
            if json {
                print_json(&section)?;
            } else {
                println!("{}", section.id);
            }
        }
        SectionAction::Rename(args) => {
            let section = board_ops::rename_section(&mut store, &args.id, &args.name)?;
            if json {
                print_json(&section)?;
            } else {
                println!("{}", section.id);
            }
        }
        SectionAction::Mv(args) => {
            let board = store.load_board()?;
            if board.section(&args.id).is_none() {
                return Err(format!("section not found: {}", args.id).into());
            }
            let (anchor, position) = match (args.before, args.after) {
                (Some(id), _) => (id, DropPosition::Before),
                (None, Some(id)) => (id, DropPosition::After),
                (None, None) => return Err("one of --before or --after is required".into()),
            };
            if board.section(&anchor).is_none() {
                return Err(format!("section not found: {}", anchor).into());
            }
            let target = DropTarget::Entity {
                id: anchor,
                position,
            };
            let outcome = board_ops::move_entity(
                &mut store,
                &dispatcher_for(&project),
                &args.id,
                target,
                args.dry_run,
            )
            .map_err(|e| note_divergence(&project, e))?;
            print_move(&outcome, json)?;
        }
    }
    Ok(())
}

fn cmd_add(args: AddArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    let task = board_ops::add_task(&mut store, &args.title, args.section.as_deref())?;
    if json {
        let board = store.load_board()?;
        print_json(&task_to_json(&board, &task))?;
    } else {
        println!("{}", task.id);
    }
    Ok(())
}

fn cmd_sub(args: SubArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    let task = board_ops::add_subtask(&mut store, &args.parent, &args.title)?;
    if json {
        let board = store.load_board()?;
        print_json(&task_to_json(&board, &task))?;
    } else {
        println!("{}", task.id);
    }
    Ok(())
}

fn cmd_rm(args: RmArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    let compact = args.compact || project.config.ordering.compact_on_delete;
    let outcome = board_ops::delete_task(&mut store, &dispatcher_for(&project), &args.id, compact)
        .map_err(|e| note_divergence(&project, e))?;
    recovery::log_task_deletion(&project.data_dir, &outcome.removed);

    if json {
        print_json(&outcome)?;
    } else {
        let subtasks = outcome.removed.len().saturating_sub(1);
        match subtasks {
            0 => println!("deleted {}", args.id),
            1 => println!("deleted {} and 1 subtask", args.id),
            n => println!("deleted {} and {} subtasks", args.id, n),
        }
    }
    Ok(())
}

fn cmd_done(args: DoneArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    let task = board_ops::set_completed(&mut store, &args.id, !args.undo)?;
    if json {
        let board = store.load_board()?;
        print_json(&task_to_json(&board, &task))?;
    } else {
        println!("{}", format_task_line(&task, false));
    }
    Ok(())
}

fn cmd_title(args: TitleArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    let task = board_ops::set_title(&mut store, &args.id, &args.title)?;
    if json {
        let board = store.load_board()?;
        print_json(&task_to_json(&board, &task))?;
    } else {
        println!("{}", format_task_line(&task, false));
    }
    Ok(())
}

fn cmd_mv(args: MvArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    let target = if let Some(id) = args.before {
        DropTarget::Entity {
            id,
            position: DropPosition::Before,
        }
    } else if let Some(id) = args.after {
        DropTarget::Entity {
            id,
            position: DropPosition::After,
        }
    } else if let Some(section_id) = args.section {
        DropTarget::SectionEnd {
            section_id: Some(section_id),
        }
    } else if args.unsectioned {
        DropTarget::SectionEnd { section_id: None }
    } else {
        return Err("a destination is required (--before, --after, --section or --unsectioned)".into());
    };

    let outcome = board_ops::move_entity(
        &mut store,
        &dispatcher_for(&project),
        &args.id,
        target,
        args.dry_run,
    )
    .map_err(|e| note_divergence(&project, e))?;
    print_move(&outcome, json)
}

fn print_move(outcome: &board_ops::MoveOutcome, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        return print_json(outcome);
    }
    if outcome.mutations.is_empty() {
        println!("{} is already there", outcome.subject.id());
        return Ok(());
    }
    for m in &outcome.mutations {
        println!("{}", format_mutation(m));
    }
    if let Some(report) = outcome.report {
        tracing::debug!(
            applied = report.applied,
            skipped = report.skipped,
            "moved {} {}",
            outcome.subject.id(),
            format_target(&outcome.target)
        );
    }
    Ok(())
}

fn cmd_compact(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);

    let report = board_ops::compact(&mut store, &dispatcher_for(&project))
        .map_err(|e| note_divergence(&project, e))?;
    if json {
        print_json(&report)?;
    } else if report.applied == 0 {
        println!("already compact");
    } else {
        println!("renumbered {}", report.applied);
    }
    Ok(())
}

fn cmd_replay(args: ReplayArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_cwd()?;
    let text = std::fs::read_to_string(&args.script)
        .map_err(|e| format!("cannot read script '{}': {}", args.script, e))?;
    let script = Script::from_json(&text)?;

    let _lock = FileLock::acquire_default(&project.data_dir)?;
    let mut store = open_store(&project);
    let mut controller = DragController::from_config(&project.config);

    let steps = replay::run_script(script, &mut controller, &mut store)?;
    if json {
        print_json(&steps)?;
    } else {
        for step in &steps {
            println!("{}", format_step(step));
        }
    }
    Ok(())
}
