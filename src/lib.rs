//! # linekv - A Line-Oriented In-Memory Key-Value Server
//!
//! linekv keeps string keys and values in memory and serves them over TCP.
//! Clients send one command per line and get one reply line back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐    ┌──────────────────────────────┐ │
//! │                     │ Line Parser │    │        StorageEngine         │ │
//! │                     └─────────────┘    │  64 RwLock-guarded shards    │ │
//! │                                        └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use linekv::server;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cancel = CancellationToken::new();
//!     let handle = server::start("127.0.0.1:6379", cancel.clone()).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     cancel.cancel();
//!     handle.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]` - `PONG` or `PONG <message>`
//! - `ECHO [message]` - the message, or an empty line
//! - `SET key [value]` - `OK`
//! - `GET key` - the value, or `-ERR no such key`
//!
//! Anything else gets `-ERR unknown command`. Names are case-sensitive.
//!
//! ## Module Overview
//!
//! - [`protocol`]: line framing, `Command` and `Reply`
//! - [`storage`]: the shared, sharded store
//! - [`commands`]: command dispatch
//! - [`connection`]: per-client read/execute/reply loop
//! - [`server`]: listener, accept loop and shutdown

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_command, Command, LineParser, ParseError, Reply};
pub use server::{start, ServerError, ServerHandle};
pub use storage::{StorageEngine, Store};

/// The default port linekv listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host linekv binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default bind address
pub const DEFAULT_ADDR: &str = "0.0.0.0:6379";

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
