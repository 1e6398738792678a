use crate::error::{ExchangeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ten years
const MAX_FAILURE_GRACE_HOURS: i64 = 10 * 366 * 24;

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct EngineConfig {
    pub max_counter_offers: u32,
    pub failure_grace_hours: i64,
    pub minor_unit_digits: u32,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct GeocodingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct SweeperConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_counter_offers: 3,
            failure_grace_hours: 7 * 24,
            minor_unit_digits: 0,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://exchanges.db".to_string(),
            max_connections: Some(5),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_seconds: Some(10),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_seconds: 300 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Some("pretty".to_string()),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| ExchangeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AppConfig = toml::from_str(&config_str)
            .map_err(|e| ExchangeError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn load_with_env_overrides<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SWAPMEET_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(key) = std::env::var("GEOCODING_API_KEY") {
            self.geocoding.api_key = Some(key);
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.failure_grace_hours < 0 {
            return Err(ExchangeError::Config("Failure grace period cannot be negative".to_string()));
        }

        if self.engine.failure_grace_hours > MAX_FAILURE_GRACE_HOURS {
            return Err(ExchangeError::Config(format!(
                "Failure grace period cannot exceed {} hours",
                MAX_FAILURE_GRACE_HOURS
            )));
        }

        if self.engine.minor_unit_digits > 6 {
            return Err(ExchangeError::Config("Minor unit digits cannot exceed 6".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(ExchangeError::Config("Database URL cannot be empty".to_string()));
        }

        if self.geocoding.endpoint.is_empty() {
            return Err(ExchangeError::Config("Geocoding endpoint cannot be empty".to_string()));
        }

        if self.sweeper.interval_seconds == 0 {
            return Err(ExchangeError::Config("Sweep interval cannot be 0".to_string()));
        }

        Ok(())
    }
}

pub fn create_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let default_config = AppConfig::default();
    let toml_str = toml::to_string_pretty(&default_config)
        .map_err(|e| ExchangeError::Config(format!("Failed to serialize default config: {}", e)))?;

    std::fs::write(path, toml_str)
        .map_err(|e| ExchangeError::Config(format!("Failed to write default config file: {}", e)))?;

    Ok(())
}
