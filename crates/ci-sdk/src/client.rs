use std::sync::Arc;

use ci_types::{Activity, BatchId, Session, SessionId, StoredObservation};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::watch::WatchBuilder;

/// Thin HTTP client over a running daemon's `/api` surface. Embedding tools
/// never touch SQLite or the vector stores directly — the daemon is the
/// only writer, this is just a typed facade over its REST API.
#[derive(Clone)]
pub struct CiClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    http: reqwest::Client,
}

impl CiClient {
    /// Connects to a daemon already listening on `base_url`, e.g.
    /// `http://127.0.0.1:37842`. Does not itself start or probe the daemon;
    /// use [`CiClient::health`] to check reachability.
    pub fn connect(base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                http: reqwest::Client::new(),
            }),
        }
    }

    pub async fn health(&self) -> Result<Value> {
        self.get("/api/health").await
    }

    pub async fn stats(&self) -> Result<Value> {
        self.get("/api/activity/stats").await
    }

    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let body: ListSessions = self.get(&format!("/api/activity/sessions?limit={limit}")).await?;
        Ok(body.sessions)
    }

    pub fn session(&self, id: impl Into<String>) -> SessionHandle {
        SessionHandle { client: self.clone(), id: SessionId::new(id.into()) }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<StoredObservation>> {
        let encoded = urlencode(query);
        let body: SearchResults = self.get(&format!("/api/activity/search?query={encoded}&limit={limit}")).await?;
        Ok(body.observations)
    }

    pub fn watch(&self) -> WatchBuilder {
        WatchBuilder::new(self.clone())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.inner.base_url);
        let response = self.inner.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(url));
        }
        Ok(response.error_for_status()?.json().await?)
    }
}

pub struct SessionHandle {
    client: CiClient,
    id: SessionId,
}

impl SessionHandle {
    pub async fn get(&self) -> Result<Session> {
        let body: SessionEnvelope = self.client.get(&format!("/api/activity/sessions/{}", self.id.as_str())).await?;
        Ok(body.session)
    }

    pub async fn activities(&self) -> Result<Vec<Activity>> {
        let body: Activities = self.client.get(&format!("/api/activity/sessions/{}/activities", self.id.as_str())).await?;
        Ok(body.activities)
    }
}

pub struct BatchHandle {
    client: CiClient,
    id: BatchId,
}

impl BatchHandle {
    pub fn new(client: CiClient, id: impl Into<String>) -> Self {
        Self { client, id: BatchId::new(id.into()) }
    }

    pub async fn activities(&self) -> Result<Vec<Activity>> {
        let body: Activities = self.client.get(&format!("/api/activity/prompt-batches/{}/activities", self.id.as_str())).await?;
        Ok(body.activities)
    }

    /// Forces this batch through the memory-promotion pipeline immediately
    /// rather than waiting for the background scheduler's next tick.
    pub async fn promote(&self) -> Result<()> {
        let url = format!("{}/api/activity/prompt-batches/{}/promote", self.client.inner.base_url, self.id.as_str());
        self.client.inner.http.post(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ListSessions {
    sessions: Vec<Session>,
}

#[derive(Deserialize)]
struct SessionEnvelope {
    session: Session,
}

#[derive(Deserialize)]
struct Activities {
    activities: Vec<Activity>,
}

#[derive(Deserialize)]
struct SearchResults {
    observations: Vec<StoredObservation>,
}

fn urlencode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}
