//! Task configuration.
//!
//! The same struct is filled either from command-line flags (via clap) or from
//! the string map a hosting framework hands to `SourceTask::start`.

use crate::error::{Error, Result};
use clap::Parser;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const URL_CONFIG: &str = "gpudb.url";
pub const USERNAME_CONFIG: &str = "gpudb.username";
pub const PASSWORD_CONFIG: &str = "gpudb.password";
pub const TIMEOUT_CONFIG: &str = "gpudb.timeout";
pub const TABLE_NAME_CONFIG: &str = "gpudb.table_name";
pub const TOPIC_CONFIG: &str = "topic";
pub const RECEIVE_TIMEOUT_CONFIG: &str = "gpudb.monitor.receive_timeout_ms";
pub const POLL_BATCH_SIZE_CONFIG: &str = "gpudb.poll.batch_size";

pub const DEFAULT_TIMEOUT_MS: u64 = 0;
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_POLL_BATCH_SIZE: usize = 1000;

/// Configuration for the table monitor source task.
#[derive(Clone, Parser)]
pub struct MonitorSourceConfig {
    /// GPUdb URL, e.g. http://localhost:9191
    #[arg(long, env = "GPUDB_URL")]
    pub gpudb_url: String,
    /// GPUdb username (optional)
    #[arg(long, env = "GPUDB_USERNAME", default_value = "")]
    pub gpudb_username: String,
    /// GPUdb password (optional)
    #[arg(long, env = "GPUDB_PASSWORD", default_value = "", hide_env_values = true)]
    pub gpudb_password: String,
    /// GPUdb request timeout in milliseconds; 0 = no timeout
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub gpudb_timeout: u64,
    /// Table to monitor for inserts
    #[arg(long)]
    pub table_name: String,
    /// Topic name stamped on every produced record
    #[arg(long)]
    pub topic: String,
    /// How long a single receive on the monitor socket waits before the
    /// session re-checks for cancellation
    #[arg(long, default_value_t = DEFAULT_RECEIVE_TIMEOUT_MS)]
    pub receive_timeout_ms: u64,
    /// Maximum number of records returned by one poll
    #[arg(long, default_value_t = DEFAULT_POLL_BATCH_SIZE)]
    pub poll_batch_size: usize,
}

impl fmt::Debug for MonitorSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorSourceConfig")
            .field("gpudb_url", &self.gpudb_url)
            .field("gpudb_username", &self.gpudb_username)
            .field("gpudb_password", &"<redacted>")
            .field("gpudb_timeout", &self.gpudb_timeout)
            .field("table_name", &self.table_name)
            .field("topic", &self.topic)
            .field("receive_timeout_ms", &self.receive_timeout_ms)
            .field("poll_batch_size", &self.poll_batch_size)
            .finish()
    }
}

impl MonitorSourceConfig {
    /// Build and validate a configuration from a framework property map.
    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| {
            props
                .get(key)
                .cloned()
                .ok_or_else(|| Error::InvalidConfig(format!("Missing required property {key}")))
        };
        let optional = |key: &str| props.get(key).cloned().unwrap_or_default();

        let config = Self {
            gpudb_url: required(URL_CONFIG)?,
            gpudb_username: optional(USERNAME_CONFIG),
            gpudb_password: optional(PASSWORD_CONFIG),
            gpudb_timeout: parse_number(props, TIMEOUT_CONFIG, DEFAULT_TIMEOUT_MS)?,
            table_name: required(TABLE_NAME_CONFIG)?,
            topic: required(TOPIC_CONFIG)?,
            receive_timeout_ms: parse_number(
                props,
                RECEIVE_TIMEOUT_CONFIG,
                DEFAULT_RECEIVE_TIMEOUT_MS,
            )?,
            poll_batch_size: parse_number(props, POLL_BATCH_SIZE_CONFIG, DEFAULT_POLL_BATCH_SIZE)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that clap cannot express.
    pub fn validate(&self) -> Result<()> {
        self.url()?;
        if self.table_name.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{TABLE_NAME_CONFIG} must not be empty"
            )));
        }
        if self.topic.trim().is_empty() {
            return Err(Error::InvalidConfig(format!("{TOPIC_CONFIG} must not be empty")));
        }
        if self.receive_timeout_ms == 0 {
            return Err(Error::InvalidConfig(format!(
                "{RECEIVE_TIMEOUT_CONFIG} must be at least 1"
            )));
        }
        if self.poll_batch_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "{POLL_BATCH_SIZE_CONFIG} must be at least 1"
            )));
        }
        Ok(())
    }

    /// The parsed GPUdb URL.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&self.gpudb_url)
            .map_err(|_| Error::InvalidConfig(format!("Invalid URL ({}).", self.gpudb_url)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(Error::InvalidConfig(format!(
                "Invalid URL ({}).",
                self.gpudb_url
            )));
        }
        Ok(url)
    }

    /// Request timeout, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.gpudb_timeout > 0).then(|| Duration::from_millis(self.gpudb_timeout))
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(
    props: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T> {
    match props.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            Error::InvalidConfig(format!(
                "{key} must be a non-negative integer, got '{raw}'"
            ))
        }),
    }
}
