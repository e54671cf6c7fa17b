//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `blecentral.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use blecentral_adapter_ble::BleConfig;
use blecentral_app::{ExchangeSettings, ReconnectPolicy, SessionSettings};
use blecentral_domain::address::Address;
use blecentral_domain::capability::CapabilityDescriptor;
use blecentral_domain::exchange::DEFAULT_GREETING;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GATT identifiers of the peripherals to talk to.
    pub capability: CapabilityDescriptor,
    /// Exchange protocol settings.
    pub exchange: ExchangeConfig,
    /// Automatic reconnect pacing.
    pub reconnect: ReconnectConfig,
    /// Per-attempt session settings.
    pub session: SessionConfig,
    /// Scan settings.
    pub scan: ScanConfig,
    /// Radio backend selection.
    pub radio: RadioConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Exchange protocol configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Echo every notification back with its sequence prefix.
    pub echo_enabled: bool,
    /// Text written when a session becomes ready.
    pub greeting: String,
}

/// Reconnect policy configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Consecutive failed attempts before giving up (`0` = never).
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Session configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for reaching `Ready` (`0` = none).
    pub setup_timeout_secs: u64,
}

/// Scan configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long to scan before picking a peripheral.
    pub duration_secs: u64,
    /// Connect to this address instead of the first connectable peripheral.
    pub target: Option<Address>,
}

/// Radio backend configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub backend: Backend,
    /// Host adapter settings, used by the `btleplug` backend.
    #[serde(flatten)]
    pub ble: BleConfig,
}

/// Which radio implementation drives the central.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The host Bluetooth adapter.
    #[default]
    Btleplug,
    /// The in-process simulated radio with a demo peripheral.
    Virtual,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "btleplug" => Ok(Self::Btleplug),
            "virtual" => Ok(Self::Virtual),
            other => Err(ConfigError::Validation(format!("unknown radio backend {other:?}"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `blecentral.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, an
    /// override cannot be parsed, or the result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("blecentral.toml")?;
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

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = var("BLECENTRAL_BACKEND") {
            self.radio.backend = val.parse()?;
        }
        if let Some(val) = var("BLECENTRAL_TARGET") {
            let target = val
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid target address {val:?}")))?;
            self.scan.target = Some(target);
        }
        if let Some(val) = var("BLECENTRAL_SCAN_SECS") {
            self.scan.duration_secs = val
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid scan duration {val:?}")))?;
        }
        if let Some(val) = var("BLECENTRAL_ECHO") {
            self.exchange.echo_enabled = parse_flag(&val)
                .ok_or_else(|| ConfigError::Validation(format!("invalid echo flag {val:?}")))?;
        }
        if let Some(val) = var("BLECENTRAL_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.duration_secs == 0 {
            return Err(ConfigError::Validation(
                "scan duration must be non-zero".to_string(),
            ));
        }
        if self.exchange.greeting.contains('\0') {
            return Err(ConfigError::Validation(
                "greeting must not contain NUL".to_string(),
            ));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Validation(
                "reconnect initial delay exceeds max delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the connection session settings.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            exchange: ExchangeSettings {
                echo_enabled: self.exchange.echo_enabled,
                greeting: self.exchange.greeting.clone(),
            },
            reconnect: ReconnectPolicy {
                max_attempts: self.reconnect.max_attempts,
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            },
            setup_timeout: (self.session.setup_timeout_secs > 0)
                .then(|| Duration::from_secs(self.session.setup_timeout_secs)),
        }
    }

    #[must_use]
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan.duration_secs)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            echo_enabled: true,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            setup_timeout_secs: 30,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            target: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "blecentrald=info,blecentral=info".to_string(),
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

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use blecentral_domain::capability::{NUS_NOTIFY_CHAR, NUS_SERVICE};

    use super::*;

    fn overrides<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| vars.get(key).map(ToString::to_string)
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.capability.service, NUS_SERVICE);
        assert!(config.exchange.echo_enabled);
        assert_eq!(config.exchange.greeting, "Ready");
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.session.setup_timeout_secs, 30);
        assert_eq!(config.scan.duration_secs, 10);
        assert_eq!(config.scan.target, None);
        assert_eq!(config.radio.backend, Backend::Btleplug);
        assert_eq!(config.radio.ble, BleConfig::default());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scan.duration_secs, 10);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [capability]
            service = '0000180d-0000-1000-8000-00805f9b34fb'

            [exchange]
            echo_enabled = false
            greeting = 'Hello'

            [reconnect]
            max_attempts = 0
            initial_delay_ms = 100
            max_delay_ms = 1000

            [session]
            setup_timeout_secs = 0

            [scan]
            duration_secs = 3
            target = 'AA:BB:CC:DD:EE:FF'

            [radio]
            backend = 'virtual'
            adapter_index = 1

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.capability.service.to_string(),
            "0000180d-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(config.capability.notify_characteristic, NUS_NOTIFY_CHAR);
        assert!(!config.exchange.echo_enabled);
        assert_eq!(config.exchange.greeting, "Hello");
        assert_eq!(config.reconnect.max_attempts, 0);
        assert_eq!(config.scan.duration_secs, 3);
        assert_eq!(
            config.scan.target.map(|a| a.to_string()).as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
        assert_eq!(config.radio.backend, Backend::Virtual);
        assert_eq!(config.radio.ble.adapter_index, 1);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.scan.duration_secs, 10);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_unknown_backend_in_toml() {
        let result: Result<Config, _> = toml::from_str("[radio]\nbackend = 'bluez'");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(overrides(&[
                ("BLECENTRAL_BACKEND", "Virtual"),
                ("BLECENTRAL_TARGET", "01:02:03:04:05:06"),
                ("BLECENTRAL_SCAN_SECS", "4"),
                ("BLECENTRAL_ECHO", "off"),
                ("BLECENTRAL_LOG", "info"),
            ]))
            .unwrap();

        assert_eq!(config.radio.backend, Backend::Virtual);
        assert_eq!(
            config.scan.target,
            Some(Address::new([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(config.scan.duration_secs, 4);
        assert!(!config.exchange.echo_enabled);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn should_prefer_rust_log_over_blecentral_log() {
        let mut config = Config::default();
        config
            .apply_overrides(overrides(&[
                ("BLECENTRAL_LOG", "info"),
                ("RUST_LOG", "trace"),
            ]))
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_malformed_overrides() {
        let mut config = Config::default();
        assert!(
            config
                .apply_overrides(overrides(&[("BLECENTRAL_TARGET", "nope")]))
                .is_err()
        );
        assert!(
            config
                .apply_overrides(overrides(&[("BLECENTRAL_ECHO", "maybe")]))
                .is_err()
        );
        assert!(
            config
                .apply_overrides(overrides(&[("BLECENTRAL_BACKEND", "bluez")]))
                .is_err()
        );
    }

    #[test]
    fn should_reject_zero_scan_duration() {
        let mut config = Config::default();
        config.scan.duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_greeting_with_nul() {
        let mut config = Config::default();
        config.exchange.greeting = "Re\0ady".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_inverted_reconnect_delays() {
        let mut config = Config::default();
        config.reconnect.initial_delay_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_build_session_settings() {
        let mut config = Config::default();
        config.session.setup_timeout_secs = 0;
        config.reconnect.initial_delay_ms = 250;

        let settings = config.session_settings();
        assert_eq!(settings.setup_timeout, None);
        assert_eq!(settings.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(settings.reconnect.max_delay, Duration::from_secs(30));
        assert_eq!(settings.exchange, ExchangeSettings::default());
    }

    #[test]
    fn should_map_default_session_settings() {
        assert_eq!(Config::default().session_settings(), SessionSettings::default());
    }
}
