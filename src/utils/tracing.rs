use color_eyre::eyre::Result;

use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Verbosity comes from `RUST_LOG`, falling
/// back to `info`.
pub fn init_tracing() -> Result<()> {
    let fmt_layer = fmt::layer().pretty();

    let filter_layer: EnvFilter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    // the error layer lets color-eyre reports carry span traces
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(())
}
