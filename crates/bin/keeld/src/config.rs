//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `keel.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use keel_adapter_ble::BleConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Wearable transport settings.
    pub device: DeviceConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Which wearable transport the daemon drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Synthetic heart-rate monitor, no hardware required.
    Virtual,
    /// Real BLE Heart Rate Profile monitor.
    Ble,
}

/// Wearable transport configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Transport to use at startup.
    pub transport: TransportKind,
    /// How long a device scan runs, in seconds.
    pub scan_timeout_secs: u16,
    /// Synthetic transport settings.
    #[serde(rename = "virtual")]
    pub virtual_hrm: VirtualConfig,
    /// BLE transport settings.
    pub ble: BleConfig,
}

/// Synthetic heart-rate generator settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Seconds between emitted readings.
    pub interval_secs: u16,
    /// Inclusive lower bound of the generated band, in bpm.
    pub bpm_min: u16,
    /// Inclusive upper bound of the generated band, in bpm.
    pub bpm_max: u16,
    /// Fixed RNG seed for reproducible streams.
    pub seed: Option<u64>,
}

impl Config {
    /// Load configuration from `keel.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the resulting configuration is semantically invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("keel.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("KEEL_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("KEEL_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("KEEL_TRANSPORT") {
            match val.as_str() {
                "virtual" => self.device.transport = TransportKind::Virtual,
                "ble" => self.device.transport = TransportKind::Ble,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.scan_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scan_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.device.virtual_hrm.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "virtual interval_secs must be non-zero".to_string(),
            ));
        }
        if self.device.virtual_hrm.bpm_min > self.device.virtual_hrm.bpm_max {
            return Err(ConfigError::Validation(
                "virtual bpm_min must not exceed bpm_max".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Return the scan duration as a [`Duration`].
    #[must_use]
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.device.scan_timeout_secs))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:keel.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "keeld=info,keel=info".to_string(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Virtual,
            scan_timeout_secs: 10,
            virtual_hrm: VirtualConfig::default(),
            ble: BleConfig::default(),
        }
    }
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            bpm_min: 62,
            bpm_max: 95,
            seed: None,
        }
    }
}

impl VirtualConfig {
    /// Convert into the virtual transport's own configuration type.
    #[must_use]
    pub fn to_transport(&self) -> keel_adapter_virtual::Config {
        keel_adapter_virtual::Config {
            interval: Duration::from_secs(u64::from(self.interval_secs)),
            bpm_min: self.bpm_min,
            bpm_max: self.bpm_max,
            seed: self.seed,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
