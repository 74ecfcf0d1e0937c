use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::Stream;
use ci_types::Session;

use crate::client::CiClient;
use crate::error::Result;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Builds a polling session-list watch. The daemon has no push/SSE
/// transport (spec keeps the REST surface request/response only), so this
/// is a `tokio::time::interval` loop diffing snapshots rather than a true
/// subscription — adequate for the dashboards/CLIs this SDK targets.
pub struct WatchBuilder {
    client: CiClient,
    interval: Duration,
    limit: usize,
}

impl WatchBuilder {
    pub(crate) fn new(client: CiClient) -> Self {
        Self { client, interval: DEFAULT_POLL_INTERVAL, limit: 50 }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn start(self) -> Result<LiveStream> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = self.client;
        let interval = self.interval;
        let limit = self.limit;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match client.list_sessions(limit).await {
                    Ok(sessions) => {
                        if tx.send(sessions).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::debug!(%err, "session watch poll failed");
                    }
                }
            }
        });

        Ok(LiveStream { receiver: rx })
    }
}

/// A stream of session-list snapshots, one per poll tick.
pub struct LiveStream {
    receiver: tokio::sync::mpsc::UnboundedReceiver<Vec<Session>>,
}

impl LiveStream {
    /// Poll for the next snapshot without blocking. Returns `None` if none
    /// is available yet.
    pub fn try_next(&mut self) -> Option<Vec<Session>> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for LiveStream {
    type Item = Vec<Session>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
