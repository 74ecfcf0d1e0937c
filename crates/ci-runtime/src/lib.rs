pub mod api;
pub mod cors;
pub mod dedup;
pub mod error;
pub mod governance;
pub mod hooks;
pub mod lock;
pub mod sanitize;
pub mod scheduler;
pub mod startup;
pub mod state;
pub mod tunnel;
pub mod watcher;

pub use error::{Error, Result};
pub use startup::{is_running, stop_running, Daemon};

use ci_types::ProjectRoot;

/// Entry point for `ci-cli start`: brings every subsystem up and blocks
/// until a shutdown signal arrives, then winds them down in order.
pub async fn run(project_root: ProjectRoot) -> Result<()> {
    let daemon = Daemon::start(project_root).await?;
    daemon.serve().await
}
