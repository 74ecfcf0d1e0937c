use std::fs::OpenOptions;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use axum::Router;
use ci_core::port::{derive_port, scan_candidates};
use ci_core::{machine_id, CiConfig, CiPaths};
use ci_types::ProjectRoot;
use tokio::net::TcpListener;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::error::{Error, Result};
use crate::lock::{clear_stale_pid_file, pid_file_process_alive, write_pid_file, DaemonLock};
use crate::scheduler::Scheduler;
use crate::state::AppState;
use crate::watcher::FileWatcher;
use crate::{api, hooks};

/// Everything `run` hands back to its caller once the daemon is listening:
/// the bound port and the background handles a graceful shutdown needs to
/// unwind in order.
pub struct Daemon {
    pub port: u16,
    pub state: AppState,
    listener: TcpListener,
    router: Router,
    _lock: DaemonLock,
    scheduler: Scheduler,
    watcher: Option<FileWatcher>,
}

impl Daemon {
    /// Brings up every subsystem in order, each independently fallible.
    /// Anything past logging is best-effort: a provider or file watcher
    /// that fails to start is logged and skipped rather than aborting the
    /// whole daemon, since a degraded daemon (no retrieval injection, say)
    /// is more useful to a caller than none at all.
    pub async fn start(project_root: ProjectRoot) -> Result<Self> {
        let paths = CiPaths::new(project_root.clone());
        paths.ensure_data_dir()?;

        init_logging(&paths.daemon_log())?;

        if pid_file_process_alive(&paths.daemon_pid()) {
            return Err(Error::AlreadyRunning);
        }
        clear_stale_pid_file(&paths.daemon_pid());
        let lock = DaemonLock::acquire(&paths.daemon_lock())?;

        let config = CiConfig::load(&paths.config_file())?;
        let machine = machine_id()?;

        let (derived, source) = derive_port(
            &paths.local_port_override(),
            &paths.shared_port_file(),
            git_remote_url(project_root.as_path()).as_deref(),
            project_root.as_path(),
        );
        tracing::info!(port = derived, source = ?source, "derived daemon port");

        let (listener, port) = bind_first_available(derived).await?;
        tracing::info!(port, "daemon listening");

        let state = AppState::assemble(project_root.clone(), machine, config, port)?;

        write_pid_file(&paths.daemon_pid())?;

        spawn_reconciliation(&state);

        let watcher = match FileWatcher::start(project_root.as_path().to_path_buf(), state.indexer.clone(), tokio::runtime::Handle::current()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(%err, "file watcher failed to start, code index will go stale");
                None
            }
        };

        let scheduler = Scheduler::start(state.clone());

        let router = Router::new()
            .merge(hooks::router())
            .merge(api::router())
            .layer(state.cors_origins.layer())
            .with_state(state.clone());

        Ok(Self { port, state, listener, router, _lock: lock, scheduler, watcher })
    }

    pub async fn serve(self) -> Result<()> {
        let paths = CiPaths::new(self.state.project_root.clone());
        let shutdown_state = self.state.clone();
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        shutdown(self.scheduler, self.watcher, shutdown_state).await;
        crate::lock::remove_pid_file(&paths.daemon_pid());
        Ok(())
    }
}

/// Stops background tasks in reverse dependency order: scheduler first
/// (so no new processor tick starts mid-shutdown), then the tunnel
/// (removing its URL from CORS before it goes away), then the watcher
/// drops on scope exit since its thread just stops feeding an abandoned
/// channel.
async fn shutdown(scheduler: Scheduler, watcher: Option<FileWatcher>, state: AppState) {
    scheduler.stop().await;
    if let crate::tunnel::TunnelStatus::Running { public_url } = state.tunnel.status() {
        state.cors_origins.remove(&public_url);
    }
    state.tunnel.stop();
    drop(watcher);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Compares SQLite's observation count against the memory vector store at
/// startup and, if they've drifted (store lost or never built), rebuilds
/// the index in the background rather than blocking the daemon on it.
fn spawn_reconciliation(state: &AppState) {
    let db = state.db.clone();
    let memory_store = state.memory_store.clone();
    let embedder = crate::state::build_embedder(&state.config_snapshot());
    tokio::spawn(async move {
        let plan = match ci_engine::plan_reconciliation(&db, &memory_store) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(%err, "failed to plan memory index reconciliation");
                return;
            }
        };
        match plan {
            ci_engine::ReconciliationPlan::NoOp => {}
            ci_engine::ReconciliationPlan::EmbedPending => {
                tracing::info!("memory index has pending embeddings, next processor tick will catch up");
            }
            ci_engine::ReconciliationPlan::FullRebuild => {
                tracing::info!("memory index empty but observations exist, rebuilding from scratch");
                match ci_engine::rebuild_memory_index(&db, memory_store, embedder).await {
                    Ok(count) => tracing::info!(count, "memory index rebuilt"),
                    Err(err) => tracing::warn!(%err, "memory index rebuild failed"),
                }
            }
        }
    });
}

/// Tries the derived port, then the sequential scan candidates, binding
/// the first one the OS hands us rather than pre-checking availability —
/// avoids a TOCTOU race against whatever else might grab the port between
/// check and bind.
async fn bind_first_available(derived: u16) -> Result<(TcpListener, u16)> {
    for candidate in scan_candidates(derived) {
        match TcpListener::bind(("127.0.0.1", candidate)).await {
            Ok(listener) => return Ok((listener, candidate)),
            Err(err) => {
                tracing::debug!(port = candidate, %err, "port unavailable, trying next candidate");
            }
        }
    }
    Err(Error::NoPortAvailable)
}

fn git_remote_url(project_root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(project_root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

/// Rotates `daemon.log` once it crosses 10MB, then installs a file-backed
/// subscriber. Hand-rolled rather than pulling in a log-rotation crate: the
/// workspace has no grounded dependency for it and the rotation is a single
/// rename-on-startup, not a running concern.
fn init_logging(log_path: &Path) -> Result<()> {
    const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;

    if let Ok(meta) = std::fs::metadata(log_path) {
        if meta.len() > ROTATE_AT_BYTES {
            let rotated = log_path.with_extension("log.1");
            let _ = std::fs::rename(log_path, rotated);
        }
    }

    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true).with_ansi(false).with_writer(Mutex::new(file)))
        .with(filter)
        .try_init();
    Ok(())
}

/// Status check for `ci-cli status`: a live process holding the pid file
/// means the daemon is up, regardless of whether this process can reach it.
pub fn is_running(project_root: &ProjectRoot) -> bool {
    let paths = CiPaths::new(project_root.clone());
    pid_file_process_alive(&paths.daemon_pid())
}

/// Sends SIGTERM to the pid recorded in the pid file, used by `ci-cli
/// stop`. The daemon's own `shutdown_signal` future reacts to it and winds
/// the background tasks down gracefully.
#[cfg(unix)]
pub fn stop_running(project_root: &ProjectRoot) -> Result<bool> {
    let paths = CiPaths::new(project_root.clone());
    let pid_path = paths.daemon_pid();
    let Ok(contents) = std::fs::read_to_string(&pid_path) else {
        return Ok(false);
    };
    let Ok(pid) = contents.trim().parse::<i32>() else {
        return Ok(false);
    };
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(true)
    } else {
        Ok(false)
    }
}

#[cfg(not(unix))]
pub fn stop_running(_project_root: &ProjectRoot) -> Result<bool> {
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_remote_url_is_none_outside_a_repo() {
        let tmp = std::env::temp_dir().join(format!("ci-runtime-nogit-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        assert!(git_remote_url(&tmp).is_none());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
