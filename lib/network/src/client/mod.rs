use crate::protocol::{self, ERROR_PREFIX};
use anyhow::{Context, Result};
use cli::ClientArgs;
use getset::Getters;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

/// Typed locally; ends the session without reaching the server.
const EXIT_COMMAND: &str = "exit";

const PROMPT: &str = "docrel> ";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("not connected to a server")]
    NotConnected,
    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),
}

#[derive(Debug)]
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Response to a single statement.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct Response {
    lines: Vec<String>,
}

impl Response {
    pub fn is_error(&self) -> bool {
        self.lines
            .first()
            .map_or(false, |line| line.starts_with(ERROR_PREFIX))
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Getters, TypedBuilder)]
pub struct DbClient {
    #[getset(get = "pub")]
    server_address: String,
    #[builder(default)]
    connection: Option<Connection>,
}

pub fn is_exit_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_COMMAND)
}

impl DbClient {
    pub fn new(server_address: String) -> Self {
        DbClient::builder().server_address(server_address).build()
    }

    pub async fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect(&self.server_address)
            .await
            .with_context(|| format!("Failed to connect to server at {}", &self.server_address))?;
        let (read_half, write_half) = stream.into_split();
        self.connection = Some(Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
        });
        info!("Connected to {}", self.server_address);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Sends one statement and waits for its complete response block.
    pub async fn execute(&mut self, statement: &str) -> Result<Response, ClientError> {
        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;

        protocol::write_request(&mut connection.writer, statement).await?;
        let lines = protocol::read_response(&mut connection.reader).await?;
        debug!(lines = lines.len(), "Received response");

        Ok(Response { lines })
    }

    /// Reads statements from stdin until EOF or `exit`, printing every response.
    pub async fn run_repl(&mut self) -> Result<()> {
        let mut stdin = BufReader::new(io::stdin()).lines();
        let mut stdout = io::stdout();

        loop {
            stdout.write_all(PROMPT.as_bytes()).await?;
            stdout.flush().await?;

            let Some(input) = stdin.next_line().await? else {
                break;
            };
            let statement = input.trim();
            if statement.is_empty() {
                continue;
            }
            if is_exit_command(statement) {
                break;
            }

            let response = self.execute(statement).await?;
            if response.is_error() {
                eprintln!("{}", response.text());
            } else {
                println!("{}", response.text());
            }
        }

        Ok(())
    }
}

pub async fn start_client(args: &ClientArgs) -> Result<()> {
    let server_address = format!("{}:{}", args.host(), args.port());
    info!(address = %server_address, "Starting client");

    let mut client = DbClient::new(server_address);
    client.connect().await?;
    client.run_repl().await?;

    info!("Client session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_is_case_insensitive() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("  EXIT "));
        assert!(is_exit_command("Exit"));
        assert!(!is_exit_command("exit;"));
        assert!(!is_exit_command("SELECT exit FROM d.t"));
    }

    #[tokio::test]
    async fn test_execute_requires_a_connection() {
        let mut client = DbClient::new("127.0.0.1:1".to_string());

        assert!(!client.is_connected());
        assert!(matches!(
            client.execute("SHOW DATABASES").await,
            Err(ClientError::NotConnected)
        ));
    }
}
