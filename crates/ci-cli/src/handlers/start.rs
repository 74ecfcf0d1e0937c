use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Result};
use ci_types::ProjectRoot;

const STARTUP_POLL_ATTEMPTS: u32 = 50;
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn handle(project_root: ProjectRoot, foreground: bool) -> Result<()> {
    if foreground {
        return super::daemon::handle(project_root);
    }

    if ci_runtime::is_running(&project_root) {
        println!("daemon already running for {}", project_root);
        return Ok(());
    }

    let exe = std::env::current_exe()?;
    Command::new(exe)
        .arg("--project-root")
        .arg(project_root.as_path())
        .arg("daemon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    for _ in 0..STARTUP_POLL_ATTEMPTS {
        if ci_runtime::is_running(&project_root) {
            println!("daemon started for {}", project_root);
            return Ok(());
        }
        std::thread::sleep(STARTUP_POLL_INTERVAL);
    }

    bail!("daemon did not report ready within {:?}", STARTUP_POLL_INTERVAL * STARTUP_POLL_ATTEMPTS)
}
