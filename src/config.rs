use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

const PLACEHOLDER_GEMINI_API_KEY: &str = "PLACEHOLDER_GEMINI_API_KEY";

/// Main configuration structure for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub store: StoreConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub bind: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Key namespace for every document; the live store is disabled without it
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub credentials_path: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub recycle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub title: String,
    /// Business time zone used for window boundaries
    pub utc_offset_hours: i32,
    /// Number of prior exchanges replayed as context
    pub history_limit: usize,
    pub schema_path: String,
}

/// Contents of the optional store credentials file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreCredentials {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("DASHBOARD_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = Self::from_file(&config_path);
        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file(config_path: &str) -> Self {
        if !Path::new(config_path).exists() {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            return Self::default();
        }

        match fs::read_to_string(config_path) {
            Ok(contents) => Self::from_yaml(&contents).unwrap_or_else(|e| {
                tracing::error!(
                    "Failed to parse config file {}: {} - using defaults",
                    config_path,
                    e
                );
                Self::default()
            }),
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    config_path,
                    e
                );
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        let config = serde_yaml::from_str::<Config>(contents)?;
        tracing::info!("Loaded configuration for {}", config.server.name);
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = env::var("DASHBOARD_HTTP_BIND") {
            self.server.bind = bind;
        }
        if let Ok(token) = env::var("DASHBOARD_BEARER_TOKEN") {
            if !token.is_empty() {
                self.server.bearer_token = Some(token);
            }
        }

        // Gemini overrides
        if let Ok(api_key) = env::var("GEMINI_API_KEY") {
            self.gemini.api_key = api_key;
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            self.gemini.model = model;
        }

        // Store overrides
        if let Ok(project_id) = env::var("METRICS_PROJECT_ID") {
            self.store.project_id = Some(project_id).filter(|p| !p.is_empty());
        }
        if let Ok(path) = env::var("METRICS_CREDENTIALS_PATH") {
            self.store.credentials_path = Some(path);
        }
        if let Ok(host) = env::var("REDIS_HOST") {
            self.store.host = host;
        }
        if let Ok(port) = env::var("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.store.port = port_num;
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.store.database = db_num;
            }
        }
        if let Ok(pool_size) = env::var("DASHBOARD_REDIS_POOL_SIZE") {
            if let Ok(size) = pool_size.parse() {
                self.store.pool.max_size = size;
            }
        }

        if let Ok(offset) = env::var("DASHBOARD_UTC_OFFSET_HOURS") {
            if let Ok(hours) = offset.parse() {
                self.dashboard.utc_offset_hours = hours;
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.store.port == 0 {
            return Err("Redis port cannot be 0".into());
        }
        if !(-12..=14).contains(&self.dashboard.utc_offset_hours) {
            return Err("dashboard.utc_offset_hours must be between -12 and 14".into());
        }
        if self.dashboard.history_limit == 0 {
            return Err("dashboard.history_limit cannot be 0".into());
        }

        let missing = self.missing_settings();
        if !missing.is_empty() {
            return Err(format!("missing settings: {}", missing.join(", ")).into());
        }

        Ok(())
    }

    /// Names of unset settings the operator should provide
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.gemini_configured() {
            missing.push("GEMINI_API_KEY");
        }
        if self.store.project_id.is_none() {
            missing.push("METRICS_PROJECT_ID");
        }
        missing
    }

    pub fn gemini_configured(&self) -> bool {
        !self.gemini.api_key.is_empty() && self.gemini.api_key != PLACEHOLDER_GEMINI_API_KEY
    }

    /// Business time zone; out-of-range offsets fall back to UTC
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.dashboard.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    fn load_credentials(&self) -> StoreCredentials {
        let Some(path) = self.store.credentials_path.as_deref() else {
            return StoreCredentials::default();
        };

        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse store credentials {}: {}", path, e);
                StoreCredentials::default()
            }),
            Err(e) => {
                tracing::warn!("Store credentials not readable at {}: {}", path, e);
                StoreCredentials::default()
            }
        }
    }

    /// Get the store URL, preferring the credentials file over host settings
    pub fn get_store_url(&self) -> String {
        let credentials = self.load_credentials();
        if let Some(url) = credentials.url {
            return url;
        }

        let password = credentials
            .password
            .or_else(|| env::var("REDIS_PASSWORD").ok())
            .unwrap_or_else(|| {
                tracing::warn!(
                    "REDIS_PASSWORD not set, assuming no password for local development."
                );
                String::new()
            });

        if password.is_empty() {
            format!(
                "redis://{}:{}/{}",
                self.store.host, self.store.port, self.store.database
            )
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.store.host, self.store.port, self.store.database
            )
        }
    }

    /// Get pool timeout as Duration
    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.store.pool.timeout_seconds)
    }

    /// Get pool create timeout as Duration
    pub fn get_pool_create_timeout(&self) -> Duration {
        Duration::from_secs(self.store.pool.create_timeout_seconds)
    }

    /// Get pool recycle timeout as Duration
    pub fn get_pool_recycle_timeout(&self) -> Duration {
        Duration::from_secs(self.store.pool.recycle_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "newflower-dashboard".to_string(),
                bind: "127.0.0.1:8501".to_string(),
                bearer_token: None,
            },
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
                    tracing::warn!("GEMINI_API_KEY not set, using placeholder");
                    PLACEHOLDER_GEMINI_API_KEY.to_string()
                }),
                model: "gemini-2.0-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            },
            store: StoreConfig {
                project_id: None,
                credentials_path: Some("config/store-credentials.json".to_string()),
                host: "localhost".to_string(),
                port: 6379,
                database: 0,
                pool: PoolConfig {
                    max_size: 8,
                    timeout_seconds: 5,
                    create_timeout_seconds: 5,
                    recycle_timeout_seconds: 5,
                },
            },
            dashboard: DashboardConfig {
                title: "🤖 New Flower".to_string(),
                utc_offset_hours: 9,
                history_limit: 5,
                schema_path: "config/schema.yaml".to_string(),
            },
        }
    }
}
