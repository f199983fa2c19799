//! Line Framing and Command Parsing
//!
//! Incoming bytes are split into lines first, then each line is tokenized into
//! a [`Command`].
//!
//! ## How the Framer Works
//!
//! [`LineParser::parse`] looks at a buffer and returns either:
//! - `Ok(Some((line, consumed)))` - A complete line, `consumed` bytes were used
//! - `Ok(None)` - No `\n` yet, the line is incomplete
//! - `Err(ParseError)` - The pending line exceeds the configured maximum
//!
//! This lets the connection handler:
//! 1. Append incoming network data to a buffer
//! 2. Call `parse()` to pull out a line
//! 3. If successful, advance the buffer by `consumed` bytes
//! 4. If incomplete, wait for more data
//! 5. If error, disconnect the client
//!
//! Tokenizing never fails: a line with no tokens yields `None` and is ignored,
//! and unrecognized command names are left for the dispatcher to reject.

use crate::protocol::types::{Command, LF};
use thiserror::Error;

/// Errors that can occur while framing lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The pending line exceeds the maximum allowed size
    #[error("line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum length of a single request line, terminator excluded (64 KB).
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Splits a byte buffer into `\n`-terminated lines.
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    max_line_length: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default [`MAX_LINE_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Attempts to extract one line from the front of `buf`.
    ///
    /// The returned line excludes the `\n` and one trailing `\r`. Bytes that are
    /// not valid UTF-8 are replaced rather than rejected.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
        match find_lf(buf) {
            Some(pos) => {
                let line = strip_cr(&buf[..pos]);
                if line.len() > self.max_line_length {
                    return Err(ParseError::LineTooLong {
                        len: line.len(),
                        max: self.max_line_length,
                    });
                }
                Ok(Some((decode(line), pos + 1)))
            }
            None if strip_cr(buf).len() > self.max_line_length => Err(ParseError::LineTooLong {
                len: buf.len(),
                max: self.max_line_length,
            }),
            None => Ok(None),
        }
    }

    /// Decodes whatever is left in the buffer once the peer has closed the stream.
    ///
    /// A final line without a terminator is still a request.
    pub fn parse_remaining(&self, buf: &[u8]) -> ParseResult<Option<String>> {
        if buf.is_empty() {
            return Ok(None);
        }
        if let Some((line, _)) = self.parse(buf)? {
            return Ok(Some(line));
        }
        Ok(Some(decode(strip_cr(buf))))
    }
}

#[inline]
fn find_lf(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == LF)
}

#[inline]
fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn decode(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

/// Tokenizes a request line.
///
/// Leading and trailing whitespace is trimmed and tokens are split on runs of
/// whitespace. Returns `None` for a line without tokens.
///
/// # Example
///
/// ```
/// use linekv::protocol::parse_command;
///
/// let cmd = parse_command("  SET  name   Ariz \r").unwrap();
/// assert_eq!(cmd.name, "SET");
/// assert_eq!(cmd.args, vec!["name", "Ariz"]);
///
/// assert!(parse_command("   ").is_none());
/// ```
pub fn parse_command(line: &str) -> Option<Command> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    let args = tokens.map(str::to_string).collect();
    Some(Command::new(name, args))
}
