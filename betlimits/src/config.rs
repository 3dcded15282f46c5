//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `BETLIMITS_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `BETLIMITS_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `BETLIMITS_RESERVATIONS__TTL=5m` sets the `reservations.ttl` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use betlimits::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! BETLIMITS_PORT=8080
//!
//! # Hold reservations for five minutes, sweep every ten seconds
//! BETLIMITS_RESERVATIONS__TTL=5m
//! BETLIMITS_RESERVATIONS__SWEEP_INTERVAL=10s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BETLIMITS_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults, so an empty or missing config file yields a runnable service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Expose Prometheus metrics at `/metrics`
    pub enable_metrics: bool,
    /// Reservation ledger settings
    pub reservations: ReservationsConfig,
}

/// Reservation ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReservationsConfig {
    /// How long a reservation holds its amount before it stops counting (default: 3m)
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// How often the sweeper removes expired reservations (default: 30s)
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for ReservationsConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            enable_metrics: true,
            reservations: ReservationsConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.reservations.ttl.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: reservations.ttl must be greater than zero".to_string(),
            });
        }

        if self.reservations.sweep_interval.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: reservations.sweep_interval must be greater than zero".to_string(),
            });
        }

        if self.reservations.sweep_interval > self.reservations.ttl {
            tracing::warn!(
                "reservations.sweep_interval ({:?}) is longer than reservations.ttl ({:?}); expired holds will linger in memory",
                self.reservations.sweep_interval,
                self.reservations.ttl
            );
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("BETLIMITS_").ignore(&["CONFIG"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
