use std::path::Path;
use std::process::Command;

use anyhow::Result;
use ci_core::port::{derive_port, scan_candidates};
use ci_core::CiPaths;
use ci_sdk::CiClient;
use ci_types::ProjectRoot;

pub fn handle(project_root: ProjectRoot) -> Result<()> {
    if !ci_runtime::is_running(&project_root) {
        println!("daemon not running for {}", project_root);
        return Ok(());
    }

    let paths = CiPaths::new(project_root.clone());
    let (derived, _source) = derive_port(
        &paths.local_port_override(),
        &paths.shared_port_file(),
        git_remote_url(project_root.as_path()).as_deref(),
        project_root.as_path(),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        for candidate in scan_candidates(derived) {
            let client = CiClient::connect(format!("http://127.0.0.1:{candidate}"));
            if let Ok(health) = client.health().await {
                println!("daemon running for {} on port {}", project_root, candidate);
                println!("{}", serde_json::to_string_pretty(&health)?);
                return Ok(());
            }
        }
        println!("daemon process is alive for {} but did not answer on any candidate port", project_root);
        Ok(())
    })
}

/// Mirrors the daemon's own git-remote lookup (spec keeps port derivation
/// and its CLI-side confirmation in sync without sharing a process).
fn git_remote_url(project_root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(project_root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let url = String::from_utf8(output.stdout).ok()?;
    let trimmed = url.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
