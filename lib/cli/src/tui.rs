use crate::SqlArgs;
use anyhow::{bail, Context, Result};
use driver::{shell::Shell, Driver};
use std::sync::Arc;
use tracing::{info, instrument};

/// Shell history lives next to the data it was typed against.
const HISTORY_FILE: &str = "history.txt";

/// Runs `--command` once, or starts the interactive shell.
#[instrument(skip(args))]
pub fn handle_sql_command(args: &SqlArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let driver = Arc::new(Driver::open(&config).context("unable to open the database")?);

    match args.command() {
        Some(statement) => match driver.execute_sql(statement) {
            Ok(result) => println!("{}", result),
            Err(err) => bail!("{}: {}", err.kind(), err),
        },
        None => {
            let history_file = if *config.in_memory() {
                std::env::temp_dir().join(format!("docrel-{}", HISTORY_FILE))
            } else {
                config.data_dir().join(HISTORY_FILE)
            };
            Shell::new(driver, history_file)?.run()?;
        }
    }

    info!("SQL command processing completed");
    Ok(())
}
