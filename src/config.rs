use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

use crate::timestamp::DeviceZone;

// ---------------------------------------------------------------------------
// StoreBackend
// ---------------------------------------------------------------------------

/// Where readings and commands are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Postgres, reached through `DATABASE_URL`.
    Postgres { database_url: String },
    /// Process-local store; contents are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("unknown store backend: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    /// Shared secret expected in the `x-api-key` header.
    pub api_key: String,
    pub server_host: String,
    pub server_port: u16,
    pub device_zone: DeviceZone,
    /// How long a dispenser activation counts as active.
    pub dispense_window: chrono::Duration,
    /// How long a pending command waits for acknowledgement before expiring.
    pub command_ttl: chrono::Duration,
    pub command_sweep_interval: Duration,
    /// Default number of entries returned by the history and log endpoints.
    pub history_limit: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Every value is validated
    /// here so a bad deployment fails at start-up, not on the first request.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);

        let store = match env
            .optional("STORE_BACKEND", "postgres")
            .parse::<StoreKind>()
            .context("STORE_BACKEND must be 'postgres' or 'memory'")?
        {
            StoreKind::Postgres => StoreBackend::Postgres {
                database_url: env.required("DATABASE_URL")?,
            },
            StoreKind::Memory => StoreBackend::Memory,
        };

        let api_key = env.required("IOT_API_KEY")?;
        if api_key.trim().is_empty() {
            anyhow::bail!("IOT_API_KEY must not be empty");
        }

        let history_limit: i64 = env
            .optional("HISTORY_LIMIT", "20")
            .parse()
            .context("HISTORY_LIMIT must be a positive integer")?;
        if history_limit <= 0 {
            anyhow::bail!("HISTORY_LIMIT must be a positive integer");
        }

        Ok(Self {
            store,
            api_key,
            server_host: env.optional("SERVER_HOST", "0.0.0.0"),
            server_port: env
                .optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            device_zone: env
                .optional("DEVICE_UTC_OFFSET", "+00:00")
                .parse()
                .context("DEVICE_UTC_OFFSET must look like +01:00")?,
            dispense_window: env.span("DISPENSE_WINDOW_SECS", "5")?,
            command_ttl: env.span("COMMAND_TTL_SECS", "60")?,
            command_sweep_interval: env.secs("COMMAND_SWEEP_INTERVAL_SECS", "15")?,
            history_limit,
        })
    }
}

// ---------------------------------------------------------------------------
// DashboardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL of the monitor API, without a trailing slash.
    pub api_url: String,
    pub poll_interval: Duration,
    /// Per-request timeout for every dashboard call.
    pub request_timeout: Duration,
    /// How long the optimistic "dispensing" flag stays up after a click.
    pub dispense_reset: Duration,
    /// Delay before re-fetching everything after a dispense.
    pub refetch_delay: Duration,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);
        Ok(Self {
            api_url: env
                .optional("DASHBOARD_API_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_owned(),
            poll_interval: env.secs("DASHBOARD_POLL_INTERVAL_SECS", "30")?,
            request_timeout: env.secs("DASHBOARD_REQUEST_TIMEOUT_SECS", "10")?,
            dispense_reset: env.secs("DASHBOARD_DISPENSE_RESET_SECS", "5")?,
            refetch_delay: env.secs("DASHBOARD_REFETCH_DELAY_SECS", "2")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Upper bound for every `*_SECS` setting: one day.
const MAX_SECS: u64 = 24 * 60 * 60;

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn required(&self, key: &str) -> Result<String> {
        (self.0)(key).with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_owned())
    }

    fn secs(&self, key: &str, default: &str) -> Result<Duration> {
        let secs: u64 = self
            .optional(key, default)
            .parse()
            .with_context(|| format!("{key} must be a positive integer"))?;
        if !(1..=MAX_SECS).contains(&secs) {
            anyhow::bail!("{key} must be between 1 and {MAX_SECS} seconds, got {secs}");
        }
        Ok(Duration::from_secs(secs))
    }

    /// Like [`secs`](Self::secs), for values added to timestamps.
    fn span(&self, key: &str, default: &str) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.secs(key, default)?)
            .with_context(|| format!("{key} is out of range"))
    }
}
