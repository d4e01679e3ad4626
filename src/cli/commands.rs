use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tl", about = concat!("tasklane v", env!("CARGO_PKG_VERSION"), " - sections, tasks, subtasks, drag to reorder"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,

    /// Debug logging on stderr (overridden by TL_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new project in the current directory
    Init(InitArgs),
    /// List sections and tasks in display order
    List(ListArgs),
    /// Section management
    Section(SectionCmd),
    /// Add a task at the end of a section (or the unsectioned list)
    Add(AddArgs),
    /// Add a subtask at the end of a task's subtasks
    Sub(SubArgs),
    /// Delete a task and its subtasks
    Rm(RmArgs),
    /// Mark a task done (or not done with --undo)
    Done(DoneArgs),
    /// Change task title
    Title(TitleArgs),
    /// Move a task or section next to another, or to the end of a section
    Mv(MvArgs),
    /// Validate board structure and ordering
    Check,
    /// Renumber every sibling group densely
    Compact,
    /// Run a JSON pointer script through the drag pipeline
    Replay(ReplayArgs),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Project name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Project id stamped on every entity (default: derived from the name)
    #[arg(long)]
    pub id: Option<String>,
    /// Reinitialize even if tasklane/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Only this section's tasks ("-" for unsectioned)
    pub section: Option<String>,
    /// Show each row's display order
    #[arg(long)]
    pub order: bool,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SectionCmd {
    #[command(subcommand)]
    pub action: SectionAction,
}

#[derive(Subcommand)]
pub enum SectionAction {
    /// Create a section after the existing ones
    Add(SectionAddArgs),
    /// Rename a section
    Rename(SectionRenameArgs),
    /// Reorder a section relative to another
    Mv(SectionMvArgs),
}

#[derive(Args)]
pub struct SectionAddArgs {
    pub name: String,
}

#[derive(Args)]
pub struct SectionRenameArgs {
    /// Section ID
    pub id: String,
    pub name: String,
}

#[derive(Args)]
#[command(group(ArgGroup::new("dest").required(true).args(["before", "after"])))]
pub struct SectionMvArgs {
    /// Section ID
    pub id: String,
    /// Place before this section
    #[arg(long)]
    pub before: Option<String>,
    /// Place after this section
    #[arg(long)]
    pub after: Option<String>,
    /// Show the planned updates without applying them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Section ID (default: unsectioned)
    #[arg(long, short)]
    pub section: Option<String>,
}

#[derive(Args)]
pub struct SubArgs {
    /// Parent task ID
    pub parent: String,
    /// Subtask title
    pub title: String,
}

#[derive(Args)]
pub struct RmArgs {
    /// Task ID
    pub id: String,
    /// Renumber the remaining siblings now, whatever the config says
    #[arg(long)]
    pub compact: bool,
}

#[derive(Args)]
pub struct DoneArgs {
    /// Task ID
    pub id: String,
    /// Mark not done
    #[arg(long)]
    pub undo: bool,
}

#[derive(Args)]
pub struct TitleArgs {
    /// Task ID
    pub id: String,
    /// New title
    pub title: String,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("dest")
        .required(true)
        .args(["before", "after", "section", "unsectioned"])
))]
pub struct MvArgs {
    /// Task or section ID
    pub id: String,
    /// Place before this task (or section)
    #[arg(long)]
    pub before: Option<String>,
    /// Place after this task (or section)
    #[arg(long)]
    pub after: Option<String>,
    /// Append to the end of this section
    #[arg(long)]
    pub section: Option<String>,
    /// Append to the end of the unsectioned list
    #[arg(long)]
    pub unsectioned: bool,
    /// Show the planned updates without applying them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Path to the JSON script
    pub script: String,
}
