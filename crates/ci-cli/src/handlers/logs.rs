use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ci_core::CiPaths;
use ci_types::ProjectRoot;

const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(300);

pub fn handle(project_root: ProjectRoot, lines: usize, follow: bool) -> Result<()> {
    let log_path = CiPaths::new(project_root).daemon_log();
    if !log_path.exists() {
        println!("no log file yet at {}", log_path.display());
        return Ok(());
    }

    let contents = std::fs::read_to_string(&log_path)?;
    for line in tail(&contents, lines) {
        println!("{line}");
    }

    if !follow {
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    let mut file = File::open(&log_path)?;
    file.seek(SeekFrom::End(0))?;
    while running.load(Ordering::SeqCst) {
        let mut chunk = String::new();
        file.read_to_string(&mut chunk)?;
        if !chunk.is_empty() {
            print!("{chunk}");
        }
        std::thread::sleep(FOLLOW_POLL_INTERVAL);
    }

    Ok(())
}

fn tail(contents: &str, n: usize) -> Vec<&str> {
    let all: Vec<&str> = contents.lines().collect();
    let start = all.len().saturating_sub(n);
    all[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_returns_fewer_lines_than_requested_when_short() {
        assert_eq!(tail("a\nb\nc", 10), vec!["a", "b", "c"]);
    }

    #[test]
    fn tail_keeps_only_the_last_n_lines() {
        assert_eq!(tail("a\nb\nc\nd", 2), vec!["c", "d"]);
    }
}
