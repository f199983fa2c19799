//! linekv - A Line-Oriented In-Memory Key-Value Server
//!
//! This is the main entry point for the linekv server.
//! It parses arguments, sets up logging, and runs the server until Ctrl+C or SIGTERM.

use linekv::server;
use linekv::storage::StorageEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default time to let in-flight replies finish after shutdown is requested
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// How long to wait after cancelling before the process exits
    shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: linekv::DEFAULT_HOST.to_string(),
            port: linekv::DEFAULT_PORT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = required_value(&args, i, "--host").to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = required_value(&args, i, "--port")
                        .parse()
                        .unwrap_or_else(|_| fail("invalid port number"));
                    i += 2;
                }
                "--shutdown-grace" => {
                    let millis: u64 = required_value(&args, i, "--shutdown-grace")
                        .parse()
                        .unwrap_or_else(|_| fail("invalid shutdown grace (milliseconds)"));
                    config.shutdown_grace = Duration::from_millis(millis);
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("linekv version {}", linekv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => fail(&format!("{} requires a value", flag)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn print_help() {
    println!(
        r#"
linekv - A Line-Oriented In-Memory Key-Value Server

USAGE:
    linekv [OPTIONS]

OPTIONS:
    -h, --host <HOST>             Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>             Port to listen on (default: 6379)
        --shutdown-grace <MS>     Grace period before exit on Ctrl+C/SIGTERM (default: 200)
    -v, --version                 Print version information
        --help                    Print this help message

ENVIRONMENT:
    RUST_LOG                      Log filter (default: info)

CONNECTING:
    Any line-based TCP client works:
    $ nc localhost 6379
    PING
    PONG
    SET name Ariz
    OK
    GET name
    Ariz
"#
    );
}

/// Resolves on Ctrl+C, or on SIGTERM where available, and names the signal.
#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    wait_for_shutdown(&mut sigterm).await
}

#[cfg(unix)]
async fn wait_for_shutdown(sigterm: &mut signal::unix::Signal) -> anyhow::Result<&'static str> {
    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            Ok("SIGINT")
        }
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let storage = Arc::new(StorageEngine::new());
    let cancel = CancellationToken::new();

    let handle = server::start_with_storage(
        &config.bind_address(),
        cancel.clone(),
        Arc::clone(&storage) as Arc<dyn linekv::Store>,
    )
    .await?;
    info!(
        version = linekv::VERSION,
        addr = %handle.local_addr(),
        "linekv ready, press Ctrl+C or send SIGTERM to stop"
    );

    let received = shutdown_signal().await?;
    info!(signal = received, "Shutdown signal received, stopping server...");

    let stats = Arc::clone(handle.stats());
    cancel.cancel();
    handle.wait().await;

    // Open connections are not interrupted; give in-flight replies a moment.
    tokio::time::sleep(config.shutdown_grace).await;

    let storage_stats = storage.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        still_open = stats.active_connections.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        keys = storage_stats.keys,
        get_ops = storage_stats.get_ops,
        set_ops = storage_stats.set_ops,
        "Server shutdown complete"
    );
    Ok(())
}
