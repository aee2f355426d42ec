use clap::{command, Args, Parser, Subcommand};
use common::{DbConfig, DbConfigError, DEFAULT_HOST, DEFAULT_PORT};
use getset::Getters;
use std::path::{Path, PathBuf};

pub mod tui;

/// Optional configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "docrel.toml";

/// docrel: relational tables over a document store
#[derive(Debug, Parser, Getters)]
#[command(name = "docrel")]
#[command(about = "docrel: relational tables, indexes and joins over a document store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    #[getset(get = "pub")]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an interactive SQL shell or execute a single statement
    Sql(SqlArgs),
    /// Start a server accepting one statement per line over TCP
    Serve(ServeArgs),
    /// Start a client to connect to a running server
    Client(ClientArgs),
}

#[derive(Debug, Args, Getters)]
pub struct SqlArgs {
    /// Statement to execute; starts the interactive shell when absent
    #[arg(short, long)]
    #[getset(get = "pub")]
    command: Option<String>,
    /// Directory holding the metadata document and the store snapshot
    #[arg(short, long)]
    #[getset(get = "pub")]
    data_dir: Option<PathBuf>,
    /// Keep everything in memory
    #[arg(short, long)]
    #[getset(get = "pub")]
    memory: bool,
}

#[derive(Debug, Args, Getters)]
pub struct ServeArgs {
    /// Port to host the server on (overrides the configuration file)
    #[arg(short, long)]
    #[getset(get = "pub")]
    port: Option<u16>,
    /// Path to a TOML configuration file
    #[arg(short, long)]
    #[getset(get = "pub")]
    config: Option<PathBuf>,
    /// Directory holding the metadata document and the store snapshot
    #[arg(short, long)]
    #[getset(get = "pub")]
    data_dir: Option<PathBuf>,
    /// Keep everything in memory
    #[arg(short, long)]
    #[getset(get = "pub")]
    memory: bool,
}

#[derive(Debug, Args, Getters)]
pub struct ClientArgs {
    /// Hostname or IP address of the server
    #[arg(short = 'a', long, default_value = DEFAULT_HOST)]
    #[getset(get = "pub")]
    host: String,
    /// Port to connect to
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    #[getset(get = "pub")]
    port: u16,
}

fn load_config(file: Option<&Path>) -> Result<DbConfig, DbConfigError> {
    let file = file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    DbConfig::load_from_file_and_env(&file.to_string_lossy())
}

impl ServeArgs {
    /// Configuration file and environment first, then the flags given on the
    /// command line.
    pub fn resolve_config(&self) -> Result<DbConfig, DbConfigError> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(port) = self.port {
            config.set_port(port);
        }
        if let Some(data_dir) = &self.data_dir {
            config.set_data_dir(data_dir.clone());
        }
        if self.memory {
            config.set_in_memory(true);
        }
        Ok(config)
    }
}

impl SqlArgs {
    pub fn resolve_config(&self) -> Result<DbConfig, DbConfigError> {
        let mut config = load_config(None)?;
        if let Some(data_dir) = &self.data_dir {
            config.set_data_dir(data_dir.clone());
        }
        if self.memory {
            config.set_in_memory(true);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;
    use std::io::Write;

    #[test]
    fn test_client_defaults() {
        let cli = Cli::try_parse_from(["docrel", "client"]).unwrap();

        match cli.command() {
            Commands::Client(args) => {
                assert_eq!(args.host(), DEFAULT_HOST);
                assert_eq!(*args.port(), DEFAULT_PORT);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_serve_flags_override_the_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 4000\ndata_dir = \"/srv/docrel\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["docrel", "serve", "--config", &path, "--port", "4100"])
            .unwrap();
        let Commands::Serve(args) = cli.command() else {
            panic!("expected serve");
        };
        let config = args.resolve_config().unwrap();

        assert_eq!(*config.port(), 4100);
        assert_eq!(config.data_dir(), &PathBuf::from("/srv/docrel"));
        assert!(!*config.in_memory());
    }

    #[test]
    fn test_sql_statement_and_memory_flag() {
        let cli = Cli::try_parse_from(["docrel", "sql", "-c", "SHOW DATABASES", "--memory"])
            .unwrap();
        let Commands::Sql(args) = cli.command() else {
            panic!("expected sql");
        };

        assert_eq!(args.command().as_deref(), Some("SHOW DATABASES"));
        assert!(*args.resolve_config().unwrap().in_memory());
    }
}
