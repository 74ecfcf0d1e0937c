use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oak-ci")]
#[command(about = "Manage the codebase intelligence daemon for this project", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project root the daemon should watch. Defaults to the current
    /// directory.
    #[arg(long, global = true)]
    pub project_root: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the daemon for this project.
    #[command(about = "Start the daemon for this project")]
    Start {
        /// Run in the foreground instead of detaching a background process.
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the running daemon for this project.
    #[command(about = "Stop the running daemon for this project")]
    Stop,

    /// Report whether the daemon is running, and its derived port.
    #[command(about = "Report whether the daemon is running")]
    Status,

    /// Print or follow the daemon's log file.
    #[command(about = "Print or follow the daemon's log file")]
    Logs {
        /// Number of trailing lines to print.
        #[arg(long, default_value_t = 50)]
        lines: usize,

        /// Keep printing new lines as they're appended.
        #[arg(long)]
        follow: bool,
    },

    /// Runs the daemon in the foreground. Not meant to be invoked directly;
    /// `start` execs this as a detached child process.
    #[command(hide = true)]
    Daemon,
}
