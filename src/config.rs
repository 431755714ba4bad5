use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Houston
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HoustonConfig {
    /// Status page backend connection
    pub backend: BackendConfig,
    /// Chat platform integration settings
    pub chat: ChatConfig,
    /// Callback server settings
    pub server: ServerConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Incident and service status vocabularies
    pub vocabulary: VocabularyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend host, without scheme (e.g. "status.example.com")
    pub host: String,
    /// Use https when talking to the backend
    pub use_ssl: bool,
    /// API credential sent as the Authorization header (can be set via env var)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
    /// How long the service reference list may be served from cache
    pub services_cache_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per second limit
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// The only room incident commands are accepted from
    pub expected_room_id: String,
    /// Public base URL callback links are built against
    pub site_url: String,
    /// Alias the bot posts under
    pub alias: String,
    /// System participant that must be present in the room
    pub system_user: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the callback server
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format
    pub json_logs: bool,
}

/// Status values are deployment data, not code. Backends rename and reorder
/// them between releases, so the accepted sets live in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub incident_statuses: Vec<String>,
    pub service_statuses: Vec<String>,
    /// Incident status that switches the draft to a maintenance window
    pub maintenance_status: String,
    /// Fallback service status for values the backend does not recognize
    pub unknown_service_status: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "localhost:8080".to_string(),
            use_ssl: false,
            api_key: None, // Read from HOUSTON_BACKEND__API_KEY or STATUS_API_KEY
            timeout_seconds: 10,
            rate_limit: RateLimitConfig {
                requests_per_second: 5,
                burst_capacity: 10,
            },
            services_cache_seconds: 60,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            burst_capacity: 10,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            expected_room_id: String::new(),
            site_url: "http://localhost:3000".to_string(),
            alias: "Houston Control".to_string(),
            system_user: "rocket.cat".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            incident_statuses: vec![
                "Investigating".to_string(),
                "Identified".to_string(),
                "Update".to_string(),
                "Monitoring".to_string(),
                "Resolved".to_string(),
            ],
            service_statuses: vec![
                "Operational".to_string(),
                "Degraded".to_string(),
                "Partial-outage".to_string(),
                "Outage".to_string(),
                "Scheduled Maintenance".to_string(),
            ],
            maintenance_status: "Scheduled Maintenance".to_string(),
            unknown_service_status: "Unknown".to_string(),
        }
    }
}

impl Default for HoustonConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            chat: ChatConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            vocabulary: VocabularyConfig::default(),
        }
    }
}

impl HoustonConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (houston.toml)
    /// 3. Environment variables (prefixed with HOUSTON_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("houston.toml").exists() {
            builder = builder.add_source(File::with_name("houston"));
        }

        builder = builder.add_source(
            Environment::with_prefix("HOUSTON")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut houston_config: HoustonConfig = config.try_deserialize()?;

        // The API key commonly arrives through the environment only
        if houston_config.backend.api_key.is_none() {
            if let Ok(key) = std::env::var("STATUS_API_KEY") {
                houston_config.backend.api_key = Some(key);
            }
        }

        Ok(houston_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    /// Scheme plus host, the way outbound backend URLs are built
    pub fn backend_base_url(&self) -> String {
        let scheme = if self.backend.use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, self.backend.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vocabulary_matches_backend_enums() {
        let vocab = VocabularyConfig::default();
        assert!(vocab
            .incident_statuses
            .contains(&"Investigating".to_string()));
        assert!(vocab.service_statuses.contains(&"Operational".to_string()));
        assert_eq!(vocab.maintenance_status, "Scheduled Maintenance");
    }

    #[test]
    fn base_url_respects_ssl_toggle() {
        let mut config = HoustonConfig::default();
        config.backend.host = "status.example.com".to_string();
        assert_eq!(config.backend_base_url(), "http://status.example.com");

        config.backend.use_ssl = true;
        assert_eq!(config.backend_base_url(), "https://status.example.com");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = HoustonConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: HoustonConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.chat.alias, config.chat.alias);
        assert_eq!(parsed.backend.host, config.backend.host);
    }

    #[test]
    fn save_to_file_writes_parseable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("houston.toml");

        let config = HoustonConfig::default();
        config.save_to_file(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: HoustonConfig = toml::from_str(&contents).unwrap();
        assert_eq!(parsed.server.bind, config.server.bind);
    }
}
