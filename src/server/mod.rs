//! Server Module
//!
//! Binds the listening socket and runs the accept loop.
//!
//! ## Example
//!
//! ```no_run
//! use linekv::server;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let cancel = CancellationToken::new();
//! let handle = server::start(linekv::DEFAULT_ADDR, cancel.clone()).await?;
//! println!("listening on {}", handle.local_addr());
//!
//! tokio::signal::ctrl_c().await?;
//! cancel.cancel();
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod listener;

pub use listener::{start, start_with_storage, ServerError, ServerHandle};
