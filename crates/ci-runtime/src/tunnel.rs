use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static TRYCLOUDFLARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://[a-zA-Z0-9-]+\.trycloudflare\.com").expect("static tunnel url pattern"));

const URL_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelStatus {
    Stopped,
    Starting,
    Running { public_url: String },
}

/// Which tunnel binary to shell out to. `cloudflared` is the only
/// implementation; the trait exists so a future provider slots in next to
/// it rather than requiring `TunnelManager` to change shape.
pub trait TunnelProvider: Send + Sync {
    fn binary(&self) -> &'static str;
    fn args(&self, port: u16) -> Vec<String>;
    fn url_pattern(&self) -> &Regex;
}

pub struct CloudflaredProvider;

impl TunnelProvider for CloudflaredProvider {
    fn binary(&self) -> &'static str {
        "cloudflared"
    }

    fn args(&self, port: u16) -> Vec<String> {
        vec!["tunnel".to_string(), "--url".to_string(), format!("http://localhost:{port}")]
    }

    fn url_pattern(&self) -> &Regex {
        &TRYCLOUDFLARE_URL
    }
}

/// Resolves a tunnel provider by name. Only `cloudflared` is implemented;
/// any other name is a configuration error rather than a silent fallback.
pub fn create_tunnel_provider(name: &str) -> Result<Box<dyn TunnelProvider>> {
    match name {
        "cloudflared" => Ok(Box::new(CloudflaredProvider)),
        other => Err(Error::Validation(format!("unknown tunnel provider: {other}"))),
    }
}

/// One tunnel-provider child process, started on demand against the
/// daemon's own port. The binary is expected on `PATH`; starting fails with
/// `Error::NotFound` rather than trying to locate or install it.
pub struct TunnelManager {
    inner: Mutex<Inner>,
    provider: Box<dyn TunnelProvider>,
}

struct Inner {
    child: Option<Child>,
    status: TunnelStatus,
}

impl TunnelManager {
    pub fn new() -> Self {
        Self::with_provider(Box::new(CloudflaredProvider))
    }

    pub fn with_provider(provider: Box<dyn TunnelProvider>) -> Self {
        Self { inner: Mutex::new(Inner { child: None, status: TunnelStatus::Stopped }), provider }
    }

    pub fn status(&self) -> TunnelStatus {
        self.inner.lock().expect("tunnel mutex poisoned").status.clone()
    }

    /// Spawns the tunnel provider's binary and blocks briefly on its
    /// stdout/stderr for the public-url line it prints once the tunnel is
    /// live.
    pub fn start(&self, port: u16) -> Result<String> {
        let mut guard = self.inner.lock().expect("tunnel mutex poisoned");
        if let TunnelStatus::Running { public_url } = &guard.status {
            return Ok(public_url.clone());
        }
        guard.status = TunnelStatus::Starting;

        let mut child = Command::new(self.provider.binary())
            .args(self.provider.args(port))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|_| Error::NotFound(format!("{} binary not found on PATH", self.provider.binary())))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let public_url = find_tunnel_url(stdout, stderr, self.provider.url_pattern()).ok_or_else(|| {
            let _ = child.kill();
            Error::Validation("tunnel process did not report a public url".to_string())
        })?;

        guard.status = TunnelStatus::Running { public_url: public_url.clone() };
        guard.child = Some(child);
        Ok(public_url)
    }

    pub fn stop(&self) {
        let mut guard = self.inner.lock().expect("tunnel mutex poisoned");
        if let Some(mut child) = guard.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        guard.status = TunnelStatus::Stopped;
    }
}

impl Default for TunnelManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Races the stdout and stderr scanner threads through a shared channel
/// instead of joining them in sequence — a provider that only ever prints
/// its url to stderr must not hang forever behind a stdout thread that
/// blocks on a still-open pipe. Gives up after `URL_WAIT_TIMEOUT` if
/// neither stream ever produces a match.
fn find_tunnel_url(
    stdout: Option<std::process::ChildStdout>,
    stderr: Option<std::process::ChildStderr>,
    pattern: &Regex,
) -> Option<String> {
    let (tx, rx) = mpsc::channel();

    let mut scanners = 0;
    if let Some(out) = stdout {
        spawn_scanner(out, pattern.clone(), tx.clone());
        scanners += 1;
    }
    if let Some(err) = stderr {
        spawn_scanner(err, pattern.clone(), tx.clone());
        scanners += 1;
    }
    drop(tx);

    if scanners == 0 {
        return None;
    }

    for _ in 0..scanners {
        match rx.recv_timeout(URL_WAIT_TIMEOUT) {
            Ok(Some(url)) => return Some(url),
            Ok(None) => continue, // that stream hit EOF with no match, wait for the other
            Err(_) => return None, // timeout or both scanners done with nothing found
        }
    }
    None
}

fn spawn_scanner<R: std::io::Read + Send + 'static>(stream: R, pattern: Regex, tx: mpsc::Sender<Option<String>>) {
    std::thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(|l| l.ok()) {
            if let Some(m) = pattern.find(&line) {
                let _ = tx.send(Some(m.as_str().to_string()));
                return;
            }
        }
        let _ = tx.send(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_pattern_matches_a_trycloudflare_line() {
        let line = "2026-07-27T00:00:00Z INF +--------------------------------------------------------------------------------------------+\n|  https://example-words-here.trycloudflare.com                                                  |";
        assert!(TRYCLOUDFLARE_URL.is_match(line));
    }

    #[test]
    fn freshly_constructed_manager_reports_stopped() {
        let manager = TunnelManager::new();
        assert_eq!(manager.status(), TunnelStatus::Stopped);
    }

    #[test]
    fn unknown_provider_name_is_rejected() {
        assert!(create_tunnel_provider("ngrok").is_err());
        assert!(create_tunnel_provider("cloudflared").is_ok());
    }

    #[test]
    fn find_tunnel_url_does_not_hang_when_only_stderr_matches() {
        use std::io::Cursor;
        let stdout = Cursor::new(b"no match here\nnothing useful\n".to_vec());
        let stderr = Cursor::new(b"starting up\nhttps://picked-words.trycloudflare.com\n".to_vec());

        let (tx, rx) = mpsc::channel();
        spawn_scanner(stdout, TRYCLOUDFLARE_URL.clone(), tx.clone());
        spawn_scanner(stderr, TRYCLOUDFLARE_URL.clone(), tx.clone());
        drop(tx);

        let mut found = None;
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(5)) {
                Ok(Some(url)) => {
                    found = Some(url);
                    break;
                }
                Ok(None) => continue,
                Err(_) => break,
            }
        }
        assert_eq!(found.as_deref(), Some("https://picked-words.trycloudflare.com"));
    }
}
