use std::path::Path;

use crate::hash::sha256_hex;

/// Daemon ports are folded into this range so a dozen projects on one
/// machine never collide with well-known service ports.
pub const PORT_RANGE_START: u16 = 37_800;
pub const PORT_RANGE_END: u16 = 38_799;
const PORT_RANGE_SIZE: u32 = (PORT_RANGE_END - PORT_RANGE_START + 1) as u32;

/// How many sequential ports to try past the derived one before giving up.
pub const MAX_SCAN_ATTEMPTS: u16 = 10;

/// Where a candidate port for this project came from, most to least
/// authoritative. Only used for logging — the caller already knows which
/// file it read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSource {
    LocalOverride,
    SharedFile,
    GitRemoteHash,
    ProjectPathHash,
}

/// Hashes `input` into the daemon port range, deterministically.
fn hash_into_range(input: &str) -> u16 {
    let digest = sha256_hex(input.as_bytes());
    let prefix = &digest[..8];
    let n = u32::from_str_radix(prefix, 16).unwrap_or(0);
    PORT_RANGE_START + (n % PORT_RANGE_SIZE) as u16
}

/// Strips a trailing `.git` and any trailing slash so `git@host:a/b.git`
/// and `git@host:a/b` and `git@host:a/b/` all hash to the same port.
fn normalize_git_remote(remote: &str) -> String {
    remote.trim_end_matches('/').trim_end_matches(".git").to_string()
}

pub fn port_from_git_remote(remote_url: &str) -> u16 {
    hash_into_range(&normalize_git_remote(remote_url))
}

pub fn port_from_project_path(project_root: &Path) -> u16 {
    hash_into_range(&project_root.to_string_lossy())
}

/// Read a plain-text port number out of a file, ignoring surrounding
/// whitespace. Used for both the local-override and shared port files,
/// which are just the decimal port number, nothing else.
fn read_port_file(path: &Path) -> Option<u16> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Priority order from spec: local override file, then team-shared file,
/// then git remote hash, then project-path hash. The first candidate that
/// produces a value wins; `git_remote_url` may be `None` when the project
/// isn't under git or has no remote configured.
pub fn derive_port(
    local_override_path: &Path,
    shared_port_path: &Path,
    git_remote_url: Option<&str>,
    project_root: &Path,
) -> (u16, PortSource) {
    if let Some(port) = read_port_file(local_override_path) {
        return (port, PortSource::LocalOverride);
    }
    if let Some(port) = read_port_file(shared_port_path) {
        return (port, PortSource::SharedFile);
    }
    if let Some(remote) = git_remote_url {
        return (port_from_git_remote(remote), PortSource::GitRemoteHash);
    }
    (port_from_project_path(project_root), PortSource::ProjectPathHash)
}

/// Candidate ports to try in order: the derived port, then up to
/// `MAX_SCAN_ATTEMPTS` sequential ports after it, wrapping within the
/// daemon's reserved range rather than spilling into unrelated services.
pub fn scan_candidates(start: u16) -> Vec<u16> {
    let mut candidates = Vec::with_capacity(MAX_SCAN_ATTEMPTS as usize + 1);
    candidates.push(start);
    for offset in 1..=MAX_SCAN_ATTEMPTS {
        let next = PORT_RANGE_START + ((start - PORT_RANGE_START) as u32 + offset as u32) as u16 % PORT_RANGE_SIZE as u16;
        candidates.push(next);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_remote_always_derives_same_port() {
        assert_eq!(port_from_git_remote("git@github.com:acme/widgets.git"), port_from_git_remote("git@github.com:acme/widgets"));
    }

    #[test]
    fn derived_port_is_within_range() {
        let port = port_from_project_path(Path::new("/home/dev/widgets"));
        assert!(port >= PORT_RANGE_START && port <= PORT_RANGE_END);
    }

    #[test]
    fn local_override_takes_priority_over_everything() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("daemon.port");
        let shared = dir.path().join("shared.port");
        std::fs::write(&local, "38000").unwrap();
        std::fs::write(&shared, "38111").unwrap();
        let (port, source) = derive_port(&local, &shared, Some("git@host:a/b.git"), Path::new("/tmp"));
        assert_eq!(port, 38000);
        assert_eq!(source, PortSource::LocalOverride);
    }

    #[test]
    fn falls_back_to_project_path_hash_without_git_remote() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("daemon.port");
        let shared = dir.path().join("shared.port");
        let (_, source) = derive_port(&local, &shared, None, Path::new("/tmp/widgets"));
        assert_eq!(source, PortSource::ProjectPathHash);
    }

    #[test]
    fn scan_candidates_wraps_within_range() {
        let candidates = scan_candidates(PORT_RANGE_END);
        assert_eq!(candidates[1], PORT_RANGE_START);
    }
}
