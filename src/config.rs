//! Configuration for the dice service.
//!
//! Values come from defaults, then an optional TOML file, then `FAIRDICE_*`
//! environment variables, and are validated last.

use crate::errors::ConfigurationError;
use crate::games::types::Hundredths;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiceConfig {
    pub game: GameConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
}

/// Betting limits and game economics
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Smallest accepted bet, in cents
    pub min_bet: u64,
    /// Largest accepted bet, in cents
    pub max_bet: u64,
    pub house_edge: f64,
    /// Hundredths of a percent (1 = 0.01%)
    pub min_win_chance: Hundredths,
    /// Hundredths of a percent (9500 = 95.00%)
    pub max_win_chance: Hundredths,
    /// Nonce of the first roll under a fresh server seed
    pub initial_nonce: u64,
    /// Balance credited to new accounts, in cents
    pub starting_balance: u64,
    pub default_history_limit: usize,
    pub max_history_limit: usize,
    pub default_rotation_history_limit: usize,
    pub max_rotation_history_limit: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_bet: 1,
            max_bet: 1_000_000,
            house_edge: 0.01,
            min_win_chance: Hundredths::from_raw(1),
            max_win_chance: Hundredths::from_raw(9_500),
            initial_nonce: 1,
            starting_balance: 100_000,
            default_history_limit: 50,
            max_history_limit: 100,
            default_rotation_history_limit: 10,
            max_rotation_history_limit: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Rocks,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Rocks,
            data_directory: PathBuf::from("./DB/fairdice"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub enable_websockets: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            request_timeout_secs: 30,
            enable_websockets: true,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Per-account token bucket limits
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub bet_points: u32,
    pub bet_window_secs: u64,
    pub seed_points: u32,
    pub seed_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bet_points: 10,
            bet_window_secs: 60,
            seed_points: 5,
            seed_window_secs: 300,
        }
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_override<T: std::str::FromStr>(field: &str, raw: String, reason: &str) -> Result<T, ConfigurationError> {
    raw.parse().map_err(|_| invalid(field, raw, reason))
}

/// Loads `DiceConfig` from file and environment
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn load(&self) -> Result<DiceConfig, ConfigurationError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as `load`, reading overrides through `lookup` instead of the process environment
    pub fn load_with<F>(&self, lookup: F) -> Result<DiceConfig, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => DiceConfig::default(),
        };
        Self::apply_overrides(&mut config, lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<DiceConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_overrides<F>(config: &mut DiceConfig, lookup: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FAIRDICE_MAX_BET") {
            config.game.max_bet = parse_override("FAIRDICE_MAX_BET", raw, "Expected cents as an integer")?;
        }
        if let Some(raw) = lookup("FAIRDICE_MIN_BET") {
            config.game.min_bet = parse_override("FAIRDICE_MIN_BET", raw, "Expected cents as an integer")?;
        }
        if let Some(raw) = lookup("FAIRDICE_HOUSE_EDGE") {
            config.game.house_edge = parse_override("FAIRDICE_HOUSE_EDGE", raw, "Expected a fraction such as 0.01")?;
        }
        if let Some(raw) = lookup("FAIRDICE_API_PORT") {
            config.api.port = parse_override("FAIRDICE_API_PORT", raw, "Invalid port number")?;
        }
        if let Some(raw) = lookup("FAIRDICE_DATA_DIR") {
            config.storage.data_directory = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("FAIRDICE_STORAGE_BACKEND") {
            config.storage.backend = match raw.as_str() {
                "memory" => StorageBackend::Memory,
                "rocks" => StorageBackend::Rocks,
                _ => return Err(invalid("FAIRDICE_STORAGE_BACKEND", raw, "Expected 'memory' or 'rocks'")),
            };
        }
        Ok(())
    }
}

impl DiceConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let game = &self.game;
        if game.min_bet == 0 {
            return Err(invalid("game.min_bet", game.min_bet, "Minimum bet must be at least one cent"));
        }
        if game.max_bet < game.min_bet {
            return Err(invalid("game.max_bet", game.max_bet, "Maximum bet is below the minimum bet"));
        }
        if !(0.0..1.0).contains(&game.house_edge) {
            return Err(invalid("game.house_edge", game.house_edge, "House edge must be in [0, 1)"));
        }
        if game.min_win_chance.raw() == 0 || game.min_win_chance > game.max_win_chance {
            return Err(invalid(
                "game.min_win_chance",
                game.min_win_chance,
                "Win chance band must be non-empty and above zero",
            ));
        }
        if game.max_win_chance >= Hundredths::HUNDRED {
            return Err(invalid("game.max_win_chance", game.max_win_chance, "Win chance must stay below 100"));
        }
        if game.max_history_limit == 0 || game.default_history_limit > game.max_history_limit {
            return Err(invalid(
                "game.default_history_limit",
                game.default_history_limit,
                "Default history limit exceeds the maximum",
            ));
        }
        if game.max_rotation_history_limit == 0
            || game.default_rotation_history_limit > game.max_rotation_history_limit
        {
            return Err(invalid(
                "game.default_rotation_history_limit",
                game.default_rotation_history_limit,
                "Default rotation history limit exceeds the maximum",
            ));
        }
        if self.api.port == 0 {
            return Err(invalid("api.port", 0, "Port cannot be zero"));
        }
        if self.storage.backend == StorageBackend::Rocks && self.storage.data_directory.as_os_str().is_empty() {
            return Err(ConfigurationError::ValidationFailed(
                "storage.data_directory is required for the rocks backend".to_string(),
            ));
        }
        let limits = &self.rate_limit;
        if limits.enabled
            && (limits.bet_points == 0
                || limits.seed_points == 0
                || limits.bet_window_secs == 0
                || limits.seed_window_secs == 0)
        {
            return Err(ConfigurationError::ValidationFailed(
                "rate limit points and windows must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
