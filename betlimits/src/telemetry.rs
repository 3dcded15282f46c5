//! Tracing initialization.
//!
//! Sets up `tracing-subscriber` with a console `fmt` layer and an `EnvFilter`. The filter defaults
//! to `info` and is overridden by the standard `RUST_LOG` variable, e.g.
//!
//! ```bash
//! RUST_LOG=betlimits=debug,tower_http=info betlimits -f config.yaml
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize console tracing.
///
/// Fails if a global subscriber has already been installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");

    Ok(())
}
