//! Runtime configuration, loaded from `ISLANDPET_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::push::{PRODUCTION_URL, SANDBOX_URL};

/// Everything the server needs beyond CLI flags.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Override for the SQLite file location (defaults to the platform data
    /// directory).
    pub db_path: Option<PathBuf>,
    pub apns: ApnsConfig,
    /// Pets untouched for at least this long get decayed each cycle.
    pub staleness: chrono::Duration,
    /// Cadence of the background decay task. Independent of `staleness`.
    pub decay_interval: Duration,
    /// Upper bound on a single delivery attempt.
    pub push_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ApnsConfig {
    pub base_url: String,
    pub team_id: String,
    pub key_id: String,
    pub bundle_id: String,
    pub key_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let team_id = require_var("ISLANDPET_TEAM_ID")?;
        let key_id = require_var("ISLANDPET_KEY_ID")?;
        let bundle_id = require_var("ISLANDPET_BUNDLE_ID")?;

        // Explicit URL override wins (useful against a local fake gateway),
        // otherwise the environment name picks the Apple host.
        let base_url = std::env::var("ISLANDPET_APNS_URL").unwrap_or_else(|_| {
            match std::env::var("ISLANDPET_APNS_ENV").as_deref() {
                Ok("sandbox") => SANDBOX_URL.to_string(),
                _ => PRODUCTION_URL.to_string(),
            }
        });

        let key_path = std::env::var("ISLANDPET_KEY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(format!("./AuthKey_{}.p8", key_id)));

        let db_path = std::env::var("ISLANDPET_DB").ok().map(PathBuf::from);

        Ok(Self {
            db_path,
            apns: ApnsConfig {
                base_url,
                team_id,
                key_id,
                bundle_id,
                key_path,
            },
            staleness: chrono::Duration::seconds(
                parse_var("ISLANDPET_STALENESS_SECS", 15)?,
            ),
            decay_interval: Duration::from_secs(
                parse_var("ISLANDPET_DECAY_INTERVAL_SECS", 300)?,
            ),
            push_timeout: Duration::from_secs(parse_var("ISLANDPET_PUSH_TIMEOUT_SECS", 10)?),
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} is not a valid number: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
