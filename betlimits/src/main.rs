//! `betlimits` server binary: loads configuration, starts the reservation engine and serves
//! the limit-reservation API until SIGTERM or Ctrl+C.

use betlimits::{Application, Config, config::Args, telemetry};
use clap::Parser;
use tokio::signal;

/// Resolves on the first termination signal. In-flight requests are drained afterwards; held
/// reservations are lost with the process.
async fn termination_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = sigterm => "SIGTERM",
    };
    tracing::info!("Received {received}, stopping reservation service");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    // `--validate` is used by deploy checks: parse and validate, then exit
    if args.validate {
        println!(
            "Configuration is valid (reservation ttl {:?}, sweep every {:?}).",
            config.reservations.ttl, config.reservations.sweep_interval
        );
        return Ok(());
    }

    telemetry::init_telemetry()?;
    tracing::debug!(config_file = %args.config, "Loaded configuration");

    Application::new(config)?.serve(termination_signal()).await
}
