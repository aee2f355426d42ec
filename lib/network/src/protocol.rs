//! The wire format spoken between [`DbClient`](crate::client::DbClient) and
//! [`DbServer`](crate::server::tcp::DbServer).
//!
//! A request is a single UTF-8 statement terminated by `\n`. A response is one
//! or more non-empty lines followed by an empty line that closes the block.
//! Failures are reported as one line starting with [`ERROR_PREFIX`].

use common::MAX_STATEMENT_LENGTH;
use driver::{DriverError, ExecutionResult};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const ERROR_PREFIX: &str = "ERROR: ";

/// Body sent when a statement produced no printable output.
const EMPTY_BODY: &str = "OK";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("statement exceeds {0} bytes")]
    StatementTooLong(usize),
    #[error("request is not valid UTF-8")]
    InvalidUtf8,
    #[error("connection closed in the middle of a response")]
    UnexpectedEof,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}

/// Reads the next statement. `None` means the peer closed the connection.
///
/// A line that is not UTF-8 is consumed whole before [`ProtocolError::InvalidUtf8`]
/// is returned, so the caller can answer it and keep reading.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = (&mut *reader)
        .take(MAX_STATEMENT_LENGTH as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if read == 0 {
        return Ok(None);
    }
    if read > MAX_STATEMENT_LENGTH && !line.ends_with(b"\n") {
        return Err(ProtocolError::StatementTooLong(MAX_STATEMENT_LENGTH));
    }

    let line = String::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok(Some(strip_line_ending(&line).to_string()))
}

pub async fn write_request<W>(writer: &mut W, statement: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let statement = statement.replace(&['\r', '\n'][..], " ");
    writer.write_all(statement.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Renders an error as the single line clients receive.
pub fn encode_error(kind: Option<&str>, message: &str) -> String {
    let message = message.replace(&['\r', '\n'][..], " ");
    match kind {
        Some(kind) => format!("{}{}: {}", ERROR_PREFIX, kind, message),
        None => format!("{}{}", ERROR_PREFIX, message),
    }
}

/// Renders the outcome of a statement as a complete response block, closing
/// empty line included.
pub fn encode_response(outcome: &Result<ExecutionResult, DriverError>) -> String {
    let body = match outcome {
        Ok(result) => result.to_string(),
        Err(err) => encode_error(Some(err.kind()), &err.to_string()),
    };

    let mut block = String::with_capacity(body.len() + 2);
    for line in body.lines().map(strip_line_ending).filter(|l| !l.is_empty()) {
        block.push_str(line);
        block.push('\n');
    }
    if block.is_empty() {
        block.push_str(EMPTY_BODY);
        block.push('\n');
    }
    block.push('\n');
    block
}

/// Reads one response block, without its closing empty line.
pub async fn read_response<R>(reader: &mut R) -> Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ProtocolError::UnexpectedEof);
        }
        let line = strip_line_ending(&line);
        if line.is_empty() {
            return Ok(lines);
        }
        lines.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_read_requests_until_eof() {
        let mut reader = BufReader::new(&b"SHOW DATABASES\r\nSHOW TABLES d\n"[..]);

        assert_eq!(
            read_request(&mut reader).await.unwrap(),
            Some("SHOW DATABASES".to_string())
        );
        assert_eq!(
            read_request(&mut reader).await.unwrap(),
            Some("SHOW TABLES d".to_string())
        );
        assert_eq!(read_request(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_request_over_the_limit_is_rejected() {
        let oversized = "x".repeat(MAX_STATEMENT_LENGTH + 10);
        let mut reader = BufReader::new(oversized.as_bytes());

        assert!(matches!(
            read_request(&mut reader).await,
            Err(ProtocolError::StatementTooLong(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_consumed() {
        let mut reader = BufReader::new(&b"SHOW \xff\xfe\nSHOW DATABASES\n"[..]);

        assert!(matches!(
            read_request(&mut reader).await,
            Err(ProtocolError::InvalidUtf8)
        ));
        assert_eq!(
            read_request(&mut reader).await.unwrap(),
            Some("SHOW DATABASES".to_string())
        );
    }

    #[test]
    fn test_error_is_a_single_line() {
        let outcome = Err(DriverError::NotFound("database `d` not found\nat line 2".into()));

        assert_eq!(
            encode_response(&outcome),
            "ERROR: NotFound: database `d` not found at line 2\n\n"
        );
    }

    #[test]
    fn test_message_response_block() {
        let outcome = Ok(ExecutionResult::Message("database `d` created".into()));

        assert_eq!(encode_response(&outcome), "database `d` created\n\n");
    }

    #[tokio::test]
    async fn test_response_block_round_trip() {
        let outcome = Ok(ExecutionResult::NoRows);
        let encoded = encode_response(&outcome);
        let mut reader = BufReader::new(encoded.as_bytes());

        assert_eq!(
            read_response(&mut reader).await.unwrap(),
            vec!["(0 rows)".to_string()]
        );
        assert!(matches!(
            read_response(&mut reader).await,
            Err(ProtocolError::UnexpectedEof)
        ));
    }
}
