use clap::Parser;
use tasklane::cli::commands::{Cli, Commands};
use tasklane::cli::handlers;
use tasklane::util::logging;

fn main() {
    let cli = Cli::parse();
    let project_dir = cli.project_dir.clone();

    match cli.command {
        None => {
            // No subcommand → launch TUI (logs go to tasklane/tl.log)
            if let Err(e) = tasklane::tui::run(project_dir.as_deref()) {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Init(args)) => {
            logging::init_stderr(cli.verbose);
            // Init is handled before project discovery
            if let Err(e) = handlers::cmd_init(args, project_dir.as_deref()) {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
        Some(_) => {
            logging::init_stderr(cli.verbose);
            if let Err(e) = handlers::dispatch(cli) {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
