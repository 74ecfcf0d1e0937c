use std::path::{Path, PathBuf};

use ci_types::ProjectRoot;

/// Resolves every on-disk location the daemon reads or writes for a given
/// project. All paths live under `<project>/.oak/ci/`, which is private to
/// the machine; the one exception is `daemon.port` under the team-shared
/// `<project>/oak/ci/` directory, which is safe (and useful) to commit so
/// every clone on a team derives the same port absent a local override.
#[derive(Debug, Clone)]
pub struct CiPaths {
    project_root: ProjectRoot,
}

impl CiPaths {
    pub fn new(project_root: ProjectRoot) -> Self {
        Self { project_root }
    }

    pub fn project_root(&self) -> &Path {
        self.project_root.as_path()
    }

    fn data_dir(&self) -> PathBuf {
        self.project_root.as_path().join(".oak").join("ci")
    }

    fn shared_dir(&self) -> PathBuf {
        self.project_root.as_path().join("oak").join("ci")
    }

    pub fn activities_db(&self) -> PathBuf {
        self.data_dir().join("activities.db")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir().join("vector")
    }

    pub fn daemon_pid(&self) -> PathBuf {
        self.data_dir().join("daemon.pid")
    }

    pub fn daemon_lock(&self) -> PathBuf {
        self.data_dir().join("daemon.lock")
    }

    /// Local, machine-specific port override. Checked before any derivation.
    pub fn local_port_override(&self) -> PathBuf {
        self.data_dir().join("daemon.port")
    }

    /// Team-shared port hint, safe to commit.
    pub fn shared_port_file(&self) -> PathBuf {
        self.shared_dir().join("daemon.port")
    }

    pub fn daemon_log(&self) -> PathBuf {
        self.data_dir().join("daemon.log")
    }

    pub fn hooks_log(&self) -> PathBuf {
        self.data_dir().join("hooks.log")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    /// Create `.oak/ci/` (and `vector/` beneath it) if they don't exist yet.
    pub fn ensure_data_dir(&self) -> crate::error::Result<()> {
        std::fs::create_dir_all(self.vector_dir())?;
        Ok(())
    }
}

/// Stable per-machine identifier cached at `~/.oak/machine_id`, created on
/// first use. Used to attribute records in cross-machine setups.
pub fn machine_id() -> crate::error::Result<ci_types::MachineId> {
    let home = dirs::home_dir()
        .ok_or_else(|| crate::error::Error::Config("no home directory".to_string()))?;
    let marker = home.join(".oak").join("machine_id");
    if let Ok(existing) = std::fs::read_to_string(&marker) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return Ok(ci_types::MachineId::new(trimmed));
        }
    }
    std::fs::create_dir_all(marker.parent().unwrap())?;
    let id = uuid::Uuid::new_v4().to_string();
    std::fs::write(&marker, &id)?;
    Ok(ci_types::MachineId::new(id))
}
