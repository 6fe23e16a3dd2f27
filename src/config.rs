use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

/// Runtime settings, read once from the environment at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// Unset runs the service on the in-memory store
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Drop and recreate the schema on startup
    pub reset_database: bool,
    /// Unset keeps live updates inside this process
    pub kafka_brokers: Option<String>,
    /// Prefix of the relay's consumer group; each instance appends its own suffix
    pub kafka_group_id: String,
    pub events_topic: String,
    pub admin_emails: Vec<String>,
    pub scheduler_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            database_max_connections: 5,
            reset_database: false,
            kafka_brokers: None,
            kafka_group_id: "auction-live".to_string(),
            events_topic: "auction-events".to_string(),
            admin_emails: Vec::new(),
            scheduler_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            listen_addr: try_load("LISTEN_ADDR", &defaults.listen_addr)?,
            database_url: optional("DATABASE_URL"),
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            reset_database: try_load("RESET_DATABASE", "false")?,
            kafka_brokers: optional("KAFKA_BROKERS"),
            kafka_group_id: try_load("KAFKA_GROUP_ID", &defaults.kafka_group_id)?,
            events_topic: try_load("EVENTS_TOPIC", &defaults.events_topic)?,
            admin_emails: parse_list(&optional("ADMIN_EMAILS").unwrap_or_default()),
            scheduler_interval: Duration::from_secs(try_load("SCHEDULER_INTERVAL_SECS", "1")?),
        })
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }
}

fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => {
            info!("{:<12} --> {} not set", "Config", key);
            None
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, String>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{:<12} --> {} not set, using default: {}", "Config", key, default);
        default.to_string()
    });
    raw.trim().parse().map_err(|e| {
        warn!("{:<12} --> invalid {} value: {}", "Config", key, e);
        format!("invalid {} value {:?}: {}", key, raw, e)
    })
}

/// Comma separated, trimmed, empty entries dropped
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// endregion: --- Tests
