//! Command-line and environment configuration for the `users-api` binary.

use clap::Parser;

/// Address used when neither `--addr` nor `USERS_API_ADDR` is given.
pub const DEFAULT_ADDR: &str = "127.0.0.1:3333";

/// Log filter used when neither `RUST_LOG`, `--log` nor `USERS_API_LOG` is given.
pub const DEFAULT_LOG_FILTER: &str = "users_api=info";

/// Runtime settings for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "users-api", version, about = "In-memory users CRUD over HTTP")]
pub struct Config {
    /// Socket address to listen on.
    #[arg(long, env = "USERS_API_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// `tracing` filter directive; `RUST_LOG` takes precedence when set.
    #[arg(long = "log", env = "USERS_API_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}
