use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use ci_codeindex::Indexer;
use notify::{PollWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tokio::runtime::Handle;

/// One dedicated worker thread watches the project tree with a
/// `PollWatcher` (reliable across the network filesystems and editors that
/// don't emit native inotify events) and relays changes to a channel; the
/// async side drains the channel and re-indexes one file at a time.
pub struct FileWatcher {
    _watcher: PollWatcher,
}

impl FileWatcher {
    pub fn start(project_root: PathBuf, indexer: Arc<Indexer>, runtime: Handle) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();

        let mut watcher = PollWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&project_root, RecursiveMode::Recursive)?;

        std::thread::Builder::new()
            .name("ci-file-watcher".to_string())
            .spawn(move || {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    while let Ok(event) = rx.recv() {
                        handle_event(event, &indexer, &runtime);
                    }
                }));
                if let Err(panic) = outcome {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(%message, "file watcher worker thread panicked");
                }
            })
            .expect("failed to spawn file watcher thread");

        Ok(Self { _watcher: watcher })
    }
}

fn handle_event(event: notify::Result<notify::Event>, indexer: &Arc<Indexer>, runtime: &Handle) {
    let event = match event {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(%err, "file watcher event error");
            return;
        }
    };

    use notify::EventKind;
    match event.kind {
        EventKind::Remove(_) => {
            for path in &event.paths {
                if let Err(err) = indexer.remove_file(path) {
                    tracing::warn!(%err, path = %path.display(), "failed to remove deleted file from index");
                }
            }
        }
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in event.paths {
                if !path.is_file() {
                    continue;
                }
                let indexer = indexer.clone();
                runtime.spawn(async move {
                    if let Err(err) = indexer.index_file(&path).await {
                        tracing::warn!(%err, path = %path.display(), "failed to reindex changed file");
                    }
                });
            }
        }
        _ => {}
    }
}
