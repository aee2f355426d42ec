pub mod handler;
pub mod tcp;

use anyhow::{Context, Result};
use cli::ServeArgs;
use driver::Driver;
use std::sync::Arc;
use tracing::info;

pub use tcp::{DbServer, ServerError};

/// Opens the configured data directory and serves statements until Ctrl-C.
pub async fn start_server(args: &ServeArgs) -> Result<()> {
    let config = args.resolve_config()?;
    info!(
        address = %config.server_address(),
        data_dir = %config.data_dir().display(),
        in_memory = config.in_memory(),
        "Starting statement server"
    );

    let driver = Driver::open(&config).context("unable to open the database")?;
    let server = DbServer::new(&config, Arc::new(driver))?;
    server.run().await?;

    info!("Server stopped");
    Ok(())
}
