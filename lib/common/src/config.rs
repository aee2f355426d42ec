//! Various configuration parameters for the server, the catalog and the document store.

use config::{ConfigBuilder, Environment, File, FileFormat};
use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use typed_builder::TypedBuilder;
use url::Url;

/// Default TCP port the statement server listens on.
pub const DEFAULT_PORT: u16 = 1234;

/// Default address the statement server binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Maximum number of client connections served at the same time. Connections beyond
/// this limit wait until a permit is released.
pub const MAX_CONNECTIONS: usize = 64;

/// File name of the catalog metadata document inside the data directory.
pub const METADATA_FILE: &str = "metadata.json";

/// File name of the document store snapshot inside the data directory.
pub const STORE_FILE: &str = "documents.json";

/// Default directory holding the metadata document and the store snapshot.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Upper bound for a single statement line received over the wire.
pub const MAX_STATEMENT_LENGTH: usize = 64 * 1024;

/// URL scheme accepted by [`DbConfig::from_connection_string`].
pub const CONNECTION_SCHEME: &str = "docrel";

/// Prefix for environment variable overrides, e.g. `DOCREL__PORT=4000`.
pub const ENV_PREFIX: &str = "DOCREL";

#[derive(Debug, Error)]
pub enum DbConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] config::ConfigError),
    #[error("invalid connection string `{0}`")]
    InvalidConnectionString(String),
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters, Setters, TypedBuilder,
)]
#[getset(get = "pub", set = "pub")]
pub struct DbConfig {
    #[builder(default = DEFAULT_HOST.to_string())]
    host: String,
    #[builder(default = DEFAULT_PORT)]
    port: u16,
    /// Directory holding the metadata document and the document store snapshot.
    #[builder(default = PathBuf::from(DEFAULT_DATA_DIR))]
    data_dir: PathBuf,
    /// Keep everything in memory; nothing is written to `data_dir`.
    #[builder(default = false)]
    in_memory: bool,
    #[builder(default = MAX_CONNECTIONS)]
    max_connections: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig::builder().build()
    }
}

impl DbConfig {
    /// Loads the configuration from an optional TOML file, then applies `DOCREL__*`
    /// environment overrides (a `.env` file in the working directory is honoured).
    pub fn load_from_file_and_env(file_path: &str) -> Result<Self, DbConfigError> {
        dotenv::dotenv().ok();

        let config = ConfigBuilder::<config::builder::DefaultState>::default()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("data_dir", DEFAULT_DATA_DIR)?
            .set_default("in_memory", false)?
            .set_default("max_connections", MAX_CONNECTIONS as i64)?
            .add_source(File::new(file_path, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize::<DbConfig>()?)
    }

    /// Parses a `docrel://host:port` connection string. Missing parts fall back to
    /// the defaults.
    pub fn from_connection_string(conn_str: &str) -> Result<Self, DbConfigError> {
        let url = Url::parse(conn_str)
            .map_err(|_| DbConfigError::InvalidConnectionString(conn_str.to_string()))?;

        if url.scheme() != CONNECTION_SCHEME {
            return Err(DbConfigError::InvalidConnectionString(conn_str.to_string()));
        }

        let host = url.host_str().unwrap_or(DEFAULT_HOST);
        let port = url.port().unwrap_or(DEFAULT_PORT);

        Ok(DbConfig::builder()
            .host(host.to_string())
            .port(port)
            .build())
    }

    /// Generates a connection string from the [`DbConfig`].
    pub fn to_connection_string(&self) -> String {
        format!("{}://{}:{}", CONNECTION_SCHEME, self.host, self.port)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }
}
