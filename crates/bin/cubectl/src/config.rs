//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `cubelink.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use cubelink_app::CubeConfig;
use cubelink_domain::version::ProtocolVersion;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timeouts and buffer sizes of the cube session.
    pub cube: CubeConfig,
    /// Which transport reaches the cube.
    pub transport: TransportConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Transport selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-memory cube, no radio needed.
    #[default]
    Virtual,
    /// A real cube over Bluetooth Low Energy.
    Ble,
}

/// Transport configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// BLE address of the cube; the first advertising cube when unset.
    pub address: Option<String>,
    /// How long to scan for a BLE cube, in seconds.
    pub locate_timeout_secs: u16,
    /// Protocol version string the virtual cube reports.
    pub firmware: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `cubelink.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("cubelink.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
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

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("CUBELINK_TRANSPORT") {
            self.transport.kind = match val.to_ascii_lowercase().as_str() {
                "virtual" => TransportKind::Virtual,
                "ble" => TransportKind::Ble,
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "CUBELINK_TRANSPORT must be `virtual` or `ble`, got `{val}`"
                    )));
                }
            };
        }
        if let Some(val) = lookup("CUBELINK_ADDRESS") {
            self.transport.address = Some(val);
        }
        if let Some(val) = lookup("CUBELINK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cube.reply_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "cube.reply_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.cube.notification_buffer == 0 || self.cube.event_buffer == 0 {
            return Err(ConfigError::Validation(
                "cube buffers must be non-zero".to_string(),
            ));
        }
        match self.transport.kind {
            TransportKind::Virtual => {
                if ProtocolVersion::parse(&self.transport.firmware).is_err() {
                    return Err(ConfigError::Validation(format!(
                        "transport.firmware is not a version: {}",
                        self.transport.firmware
                    )));
                }
            }
            TransportKind::Ble => {
                if self.transport.locate_timeout_secs == 0 {
                    return Err(ConfigError::Validation(
                        "transport.locate_timeout_secs must be non-zero".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Virtual,
            address: None,
            locate_timeout_secs: 10,
            firmware: "2.3.0".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "cubectl=info,cubelink_app=info,cubelink_adapter_ble=info".to_string(),
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
