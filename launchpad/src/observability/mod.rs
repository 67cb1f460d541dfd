//! Logging setup and log-safe identifiers.
//!
//! Call [`init_tracing`] once at program start. Library code only emits
//! through `tracing` macros and never installs a subscriber itself.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "launchpad=info";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

/// Installs the global subscriber.
///
/// Respects `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Later calls are
/// ignored since the global subscriber can only be set once.
pub fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
            .ok(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .try_init()
            .ok(),
    };
}

/// First 12 hex characters of the SHA-256 of `raw`.
///
/// Lets logs correlate uses of one credential without revealing it.
#[must_use]
pub fn credential_fingerprint(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(12);
    encoded
}
