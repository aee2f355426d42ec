use super::time::elapsed_subsec;
use anyhow::{anyhow, Result};
use indicatif::ProgressStyle;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global tracing subscriber: a fmt layer filtered by `RUST_LOG`
/// (defaulting to [`DEFAULT_LOG_FILTER`]) plus an indicatif layer rendering
/// long-running spans as progress lines.
pub fn initialize_tracing() -> Result<()> {
    let style = ProgressStyle::with_template(
        "{span_child_prefix}{span_fields} -- {span_name} {wide_msg} {elapsed_subsec}",
    )
    .map_err(|e| anyhow!("invalid progress template: {}", e))?
    .with_key("elapsed_subsec", elapsed_subsec);

    let indicatif_layer = IndicatifLayer::new()
        .with_progress_style(style)
        .with_span_child_prefix_symbol("↳ ")
        .with_span_child_prefix_indent(" ");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(indicatif_layer)
        .try_init()?;

    Ok(())
}
