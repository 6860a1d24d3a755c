//! Timestamp echo protocol.
//!
//! The client sends its local clock reading and a cooperating peer echoes
//! the same line back unchanged:
//!
//! ```text
//! Request:  1718000000123\n
//! Response: 1718000000123\n
//! ```
//!
//! There is no handshake, versioning or framing beyond the `\n` delimiter.

use bytes::{BufMut, BytesMut};
use std::num::ParseIntError;

/// Longest echo line accepted before the payload is treated as malformed.
pub const MAX_LINE_LENGTH: usize = 64;

/// Append an encoded timestamp request to `output`.
pub fn encode(timestamp_ms: i64, output: &mut BytesMut) {
    let line = format!("{timestamp_ms}\n");
    output.reserve(line.len());
    output.put_slice(line.as_bytes());
}

/// Parse an echoed line back into the timestamp it carries.
///
/// Surrounding whitespace (including the line ending) is ignored.
pub fn parse_echo(line: &str) -> Result<i64, EchoError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(EchoError::Empty);
    }
    trimmed
        .parse()
        .map_err(|e| EchoError::NotATimestamp(trimmed.to_string(), e))
}

/// Reasons an echoed line could not be turned into a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoError {
    /// Blank line.
    Empty,
    /// Line exceeded [`MAX_LINE_LENGTH`] without a newline.
    TooLong(usize),
    /// Payload is not a decimal integer.
    NotATimestamp(String, ParseIntError),
}

impl std::fmt::Display for EchoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EchoError::Empty => write!(f, "empty echo line"),
            EchoError::TooLong(len) => {
                write!(f, "echo line longer than {} bytes ({len} read)", MAX_LINE_LENGTH)
            }
            EchoError::NotATimestamp(line, e) => write!(f, "cannot convert {line:?} to int: {e}"),
        }
    }
}

impl std::error::Error for EchoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let mut buf = BytesMut::new();
        encode(1718000000123, &mut buf);
        assert_eq!(&buf[..], b"1718000000123\n");

        encode(-5, &mut buf);
        assert_eq!(&buf[..], b"1718000000123\n-5\n");
    }

    #[test]
    fn test_parse_echo() {
        assert_eq!(parse_echo("1718000000123\n"), Ok(1718000000123));
        assert_eq!(parse_echo("  42 \r\n"), Ok(42));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_echo("\n"), Err(EchoError::Empty));
        assert_eq!(parse_echo("   "), Err(EchoError::Empty));
    }

    #[test]
    fn test_parse_garbage() {
        match parse_echo("abc\n") {
            Err(EchoError::NotATimestamp(line, _)) => assert_eq!(line, "abc"),
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            parse_echo("12 34"),
            Err(EchoError::NotATimestamp(_, _))
        ));
    }

    #[test]
    fn test_error_display() {
        let err = parse_echo("abc").unwrap_err();
        assert!(err.to_string().starts_with("cannot convert \"abc\" to int"));
    }
}
