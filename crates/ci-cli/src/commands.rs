use std::path::PathBuf;

use anyhow::Result;
use ci_core::pathutil::normalize_path;
use ci_types::ProjectRoot;
use clap::CommandFactory;

use crate::args::{Cli, Commands};
use crate::handlers;

pub fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let project_root = resolve_project_root(cli.project_root.as_deref());

    match command {
        Commands::Start { foreground } => handlers::start::handle(project_root, foreground),
        Commands::Stop => handlers::stop::handle(project_root),
        Commands::Status => handlers::status::handle(project_root),
        Commands::Logs { lines, follow } => handlers::logs::handle(project_root, lines, follow),
        Commands::Daemon => handlers::daemon::handle(project_root),
    }
}

fn resolve_project_root(explicit: Option<&str>) -> ProjectRoot {
    let raw = explicit
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    ProjectRoot::new(normalize_path(&raw))
}
