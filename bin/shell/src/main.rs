use anyhow::Result;
use clap::Parser;
use cli::{tui::handle_sql_command, Cli, Commands};
use common::util::trace::initialize_tracing;
use network::client::start_client;
use network::server::start_server;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing()?;

    let args = Cli::parse();
    info!("docrel CLI started");

    match args.command() {
        Commands::Sql(args) => {
            info!("Executing SQL command");
            // the shell blocks on terminal input
            tokio::task::block_in_place(|| handle_sql_command(args))
        }
        Commands::Serve(args) => start_server(args).await,
        Commands::Client(args) => {
            info!("Starting client");
            start_client(args).await
        }
    }
}
