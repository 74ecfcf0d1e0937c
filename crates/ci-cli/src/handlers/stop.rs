use anyhow::Result;
use ci_types::ProjectRoot;

pub fn handle(project_root: ProjectRoot) -> Result<()> {
    match ci_runtime::stop_running(&project_root)? {
        true => println!("daemon stopped for {}", project_root),
        false => println!("daemon not running for {}", project_root),
    }
    Ok(())
}
