//! Thin client for embedding the codebase intelligence daemon in other
//! tools — dashboards, editor extensions, custom CLIs — without each one
//! hand-rolling HTTP calls against `/api`.
//!
//! # Quickstart
//!
//! ```no_run
//! use ci_sdk::CiClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CiClient::connect("http://127.0.0.1:37842");
//! let sessions = client.list_sessions(20).await?;
//! if let Some(session) = sessions.first() {
//!     let activities = client.session(session.id.as_str()).activities().await?;
//!     println!("{} activities", activities.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Watching sessions
//!
//! ```no_run
//! use ci_sdk::CiClient;
//! use futures::stream::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CiClient::connect("http://127.0.0.1:37842");
//! let mut stream = client.watch().start()?;
//! while let Some(sessions) = stream.next().await {
//!     println!("{} active sessions", sessions.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod watch;

pub use client::{BatchHandle, CiClient, SessionHandle};
pub use error::{Error, Result};
pub use watch::{LiveStream, WatchBuilder};
