use anyhow::Result;
use ci_types::ProjectRoot;

/// Runs the daemon in the foreground until it receives a shutdown signal.
/// This is what `start` execs into a detached child process for, and what
/// `start --foreground` runs directly.
pub fn handle(project_root: ProjectRoot) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(ci_runtime::run(project_root))?;
    Ok(())
}
