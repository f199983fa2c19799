//! Protocol Data Types
//!
//! Requests and replies are single text lines terminated by `\n`.
//!
//! ## Examples
//!
//! Request: `SET name Ariz\n`
//! Reply: `OK\n`
//! Error reply: `-ERR no such key\n`

use std::fmt;

/// Line terminator written after every reply.
pub const LF: u8 = b'\n';

/// Prefix that marks an error reply.
pub const ERROR_PREFIX: &str = "-ERR";

/// A parsed request: the command name and its whitespace-separated arguments.
///
/// The name keeps the client's original casing; matching is the dispatcher's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Arguments joined back together with single spaces.
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }
}

/// A reply to be written back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A plain text line.
    /// Format: `<text>\n`
    Line(String),

    /// An error reply; the message excludes the `-ERR` prefix.
    /// Format: `-ERR <message>\n`
    Error(String),
}

impl Reply {
    pub fn line(s: impl Into<String>) -> Self {
        Reply::Line(s.into())
    }

    /// Creates a new error reply.
    ///
    /// # Example
    /// ```
    /// use linekv::protocol::Reply;
    /// let err = Reply::error("unknown command");
    /// assert_eq!(err.serialize(), "-ERR unknown command\n");
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Common reply for successful writes
    pub fn ok() -> Self {
        Reply::Line("OK".to_string())
    }

    /// Reply to a bare `PING`
    pub fn pong() -> Self {
        Reply::Line("PONG".to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Serializes the reply into its wire form, always ending in exactly one `\n`.
    pub fn serialize(&self) -> String {
        let mut buf = String::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Appends the wire form of this reply to `buf`.
    pub fn serialize_into(&self, buf: &mut String) {
        match self {
            Reply::Line(s) => buf.push_str(s),
            Reply::Error(msg) => {
                buf.push_str(ERROR_PREFIX);
                buf.push(' ');
                buf.push_str(msg);
            }
        }
        buf.push(LF as char);
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Line(s) => write!(f, "{}", s),
            Reply::Error(msg) => write!(f, "{} {}", ERROR_PREFIX, msg),
        }
    }
}
