//! Command Handler Module
//!
//! Maps a parsed [`Command`] to a [`Reply`], reading and writing the shared store.
//!
//! ## Supported Commands
//!
//! - `PING [message ...]` - Replies `PONG`, or `PONG <message>`
//! - `ECHO [message ...]` - Replies with the message (possibly an empty line)
//! - `SET key [value ...]` - Stores the value (remaining tokens joined by spaces)
//! - `GET key` - Replies with the stored value
//!
//! Command names are matched case-sensitively. Every failure becomes an error
//! reply; executing a command never fails.

use crate::protocol::{Command, Reply};
use crate::storage::Store;
use std::sync::Arc;

/// Handles commands by dispatching them to the appropriate handlers.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<dyn Store>,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler").finish_non_exhaustive()
    }
}

impl CommandHandler {
    /// Creates a new command handler over the given store.
    pub fn new(storage: Arc<dyn Store>) -> Self {
        Self { storage }
    }

    /// Executes a command and returns the reply.
    pub fn execute(&self, command: &Command) -> Reply {
        self.dispatch(&command.name, &command.args)
    }

    fn dispatch(&self, cmd: &str, args: &[String]) -> Reply {
        match cmd {
            "PING" => self.cmd_ping(args),
            "ECHO" => self.cmd_echo(args),
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            _ => Reply::error("unknown command"),
        }
    }

    /// PING [message ...]
    fn cmd_ping(&self, args: &[String]) -> Reply {
        if args.is_empty() {
            Reply::pong()
        } else {
            Reply::line(format!("PONG {}", args.join(" ")))
        }
    }

    /// ECHO [message ...]
    fn cmd_echo(&self, args: &[String]) -> Reply {
        Reply::line(args.join(" "))
    }

    /// SET key [value ...]
    fn cmd_set(&self, args: &[String]) -> Reply {
        let Some((key, value)) = args.split_first() else {
            return wrong_arity("SET");
        };

        self.storage.set(key.clone(), value.join(" "));
        Reply::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> Reply {
        let [key] = args else {
            return wrong_arity("GET");
        };

        match self.storage.get(key) {
            Some(value) => Reply::line(value),
            None => Reply::error("no such key"),
        }
    }
}

fn wrong_arity(cmd: &str) -> Reply {
    Reply::error(format!("wrong number of arguments for '{}'", cmd))
}
