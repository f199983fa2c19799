//! Line Protocol Implementation
//!
//! Clients send one command per line and receive one reply line per command.
//!
//! ## Grammar
//!
//! ```text
//! command = name *(SP arg)
//! name    = token
//! arg     = token
//! ```
//!
//! Tokens are separated by one or more whitespace characters. Lines end in `\n`;
//! a `\r` before the `\n` is tolerated. Replies always end in a bare `\n`.
//!
//! ## Modules
//!
//! - `types`: `Command` and `Reply`
//! - `parser`: line framing and tokenizing
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{parse_command, LineParser, Reply};
//!
//! let (line, consumed) = LineParser::new().parse(b"ECHO hi\r\n").unwrap().unwrap();
//! assert_eq!(consumed, 9);
//!
//! let cmd = parse_command(&line).unwrap();
//! assert_eq!(cmd.name, "ECHO");
//!
//! assert_eq!(Reply::line(cmd.joined_args()).serialize(), "hi\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_command, LineParser, ParseError, ParseResult, MAX_LINE_LENGTH};
pub use types::{Command, Reply};
