use super::tcp::ConnectionInfo;
use crate::middleware::MiddlewareStackRef;
use crate::protocol::{self, ProtocolError};
use anyhow::{Context, Result};
use driver::{DriverError, DriverRef, ExecutionResult};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};
use typed_builder::TypedBuilder;

/// Serves one client: reads a statement per line, runs it to completion, writes
/// the response block, and repeats until the peer hangs up.
#[derive(Debug, TypedBuilder)]
pub struct ConnectionHandler {
    stream: TcpStream,
    connection: ConnectionInfo,
    driver: DriverRef,
    middleware_stack: MiddlewareStackRef,
}

impl ConnectionHandler {
    #[instrument(skip(self), fields(connection_id = %self.connection.id()))]
    pub async fn handle_connection(self) -> Result<()> {
        let ConnectionHandler {
            stream,
            connection,
            driver,
            middleware_stack,
        } = self;

        middleware_stack.handle_connect(&connection).await?;

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let served = serve_statements(
            &mut reader,
            &mut write_half,
            &connection,
            &driver,
            &middleware_stack,
        )
        .await;

        middleware_stack.handle_disconnect(&connection).await?;
        served
    }
}

async fn serve_statements<R, W>(
    reader: &mut R,
    writer: &mut W,
    connection: &ConnectionInfo,
    driver: &DriverRef,
    middleware_stack: &MiddlewareStackRef,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let statement = match protocol::read_request(reader).await {
            Ok(Some(statement)) => statement,
            Ok(None) => {
                info!("Client {} has closed the connection", connection.peer());
                return Ok(());
            }
            Err(ProtocolError::StatementTooLong(limit)) => {
                // the rest of the line is still in flight, so the stream cannot be resynchronised
                let message = format!("statement exceeds {} bytes", limit);
                let response = format!("{}\n\n", protocol::encode_error(None, &message));
                writer.write_all(response.as_bytes()).await?;
                return Ok(());
            }
            Err(ProtocolError::InvalidUtf8) => {
                debug!("Rejecting a request that is not UTF-8");
                let message = ProtocolError::InvalidUtf8.to_string();
                let response = format!("{}\n\n", protocol::encode_error(None, &message));
                writer.write_all(response.as_bytes()).await?;
                writer.flush().await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }

        middleware_stack
            .handle_before_request(connection, statement)
            .await?;
        let outcome = execute(driver.clone(), statement.to_string()).await?;
        middleware_stack
            .handle_after_request(connection, &outcome)
            .await?;

        let response = protocol::encode_response(&outcome);
        debug!(bytes = response.len(), "Writing response");
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }
}

/// Statements touch the document store synchronously, so they run on the
/// blocking pool.
async fn execute(
    driver: DriverRef,
    statement: String,
) -> Result<Result<ExecutionResult, DriverError>> {
    tokio::task::spawn_blocking(move || driver.execute_sql(&statement))
        .await
        .context("statement execution was aborted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{trace::LoggingMiddleware, MiddlewareStack};
    use driver::Driver;
    use pretty_assertions_sorted::assert_eq;
    use std::net::SocketAddr;
    use std::sync::Arc;

    async fn converse(input: &str) -> String {
        converse_bytes(input.as_bytes()).await
    }

    async fn converse_bytes(input: &[u8]) -> String {
        let driver = Arc::new(Driver::in_memory().unwrap());
        let mut stack = MiddlewareStack::new();
        stack.add_middleware(LoggingMiddleware::new());
        let connection = ConnectionInfo::new(SocketAddr::from(([127, 0, 0, 1], 6000)));

        let mut reader = BufReader::new(input);
        let mut output = Vec::new();
        serve_statements(
            &mut reader,
            &mut output,
            &connection,
            &driver,
            &Arc::new(stack),
        )
        .await
        .unwrap();

        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn test_one_block_per_statement() {
        let output = converse("CREATE DATABASE d\n\nSHOW DATABASES\nCREATE DATABASE d\n").await;
        let blocks: Vec<&str> = output.split_terminator("\n\n").collect();

        assert_eq!(blocks.len(), 3);
        assert!(blocks[1].contains("| d "));
        assert!(blocks[1].ends_with("(1 row)"));
        assert!(blocks[2].starts_with("ERROR: DuplicateEntity: "));
    }

    #[tokio::test]
    async fn test_malformed_statement_reports_an_error_line() {
        let output = converse("SELEC * FROM d.t\n").await;

        assert!(output.starts_with("ERROR: InvalidSchema: malformed statement"));
        assert!(output.ends_with("\n\n"));
        assert_eq!(output.lines().filter(|l| !l.is_empty()).count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_an_error_and_the_session_continues() {
        let output = converse_bytes(b"SHOW \xff DATABASES\nCREATE DATABASE d\n").await;
        let blocks: Vec<&str> = output.split_terminator("\n\n").collect();

        assert_eq!(
            blocks,
            vec!["ERROR: request is not valid UTF-8", "Database `d` created"]
        );
    }
}
