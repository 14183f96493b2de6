//! Process configuration: a single YAML file with environment-variable
//! overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_address: String,
    pub policy_path: PathBuf,

    pub graph_store_endpoint: String,
    pub graph_store_preshared_key: String,

    pub metadata_dsn: String,

    pub message_bus_url: String,
    pub message_bus_subject_prefix: String,

    pub check_concurrency: usize,
    pub check_timeout_secs: u64,
    pub subscriber_drain_timeout_secs: u64,

    pub jwt_secret: String,
    pub log_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
            policy_path: PathBuf::from("policy"),
            graph_store_endpoint: "http://localhost:50051".to_string(),
            graph_store_preshared_key: "permissions-engine-dev-key".to_string(),
            metadata_dsn: "postgresql://postgres@localhost/permissions".to_string(),
            message_bus_url: "nats://localhost:4222".to_string(),
            message_bus_subject_prefix: "permissions".to_string(),
            check_concurrency: 5,
            check_timeout_secs: 5,
            subscriber_drain_timeout_secs: 1,
            jwt_secret: "super-secret-key".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl Settings {
    /// Loads `config.yaml` (if present) from the current directory, then
    /// applies `PERMISSIONS_*` environment-variable overrides on top.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut settings = match std::fs::read_to_string("config.yaml") {
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(_) => Settings::default(),
        };

        if let Ok(v) = std::env::var("PERMISSIONS_BIND_ADDRESS") {
            settings.bind_address = v;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_POLICY_PATH") {
            settings.policy_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PERMISSIONS_GRAPH_STORE_ENDPOINT") {
            settings.graph_store_endpoint = v;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_GRAPH_STORE_PRESHARED_KEY") {
            settings.graph_store_preshared_key = v;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_METADATA_DSN") {
            settings.metadata_dsn = v;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_MESSAGE_BUS_URL") {
            settings.message_bus_url = v;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_MESSAGE_BUS_SUBJECT_PREFIX") {
            settings.message_bus_subject_prefix = v;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_CHECK_CONCURRENCY") {
            settings.check_concurrency = v.parse()?;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_CHECK_TIMEOUT_SECS") {
            settings.check_timeout_secs = v.parse()?;
        }
        if let Ok(v) = std::env::var("JWT_SECRET") {
            settings.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("PERMISSIONS_LOG_DIR") {
            settings.log_dir = v;
        }

        Ok(settings)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn subscriber_drain_timeout(&self) -> Duration {
        Duration::from_secs(self.subscriber_drain_timeout_secs)
    }
}
