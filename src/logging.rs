//! Tracing subscriber setup.
//!
//! Filter comes from `RUST_LOG` (default `info`). Output goes to stderr so
//! command results on stdout stay machine-readable.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "info";

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. `json` selects one JSON object per event.
pub fn init_logging(json: bool) -> Result<()> {
    let base = Registry::default().with(build_env_filter());

    if json {
        base.with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    } else {
        base.with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    }

    Ok(())
}
