//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{RcLinkError, Result};
use crate::link::Role;
use crate::packet::payload::{CommandPayload, CHANNEL_VALUE_MAX, NUM_CHANNELS};

/// Baud rates the radio bridge firmware supports
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub failsafe: FailsafeConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Link protocol configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Silence after which the link is declared lost
    #[serde(default = "default_link_timeout_ms")]
    pub link_timeout_ms: u32,

    /// Consecutive missed frames after which the link is declared lost
    #[serde(default = "default_loss_threshold")]
    pub loss_threshold: u16,

    /// Control loop rate driving `update`, send and receive
    #[serde(default = "default_update_rate_hz")]
    pub update_rate_hz: u32,

    #[serde(default = "default_enable_statistics")]
    pub enable_statistics: bool,
}

/// Which transceiver the binary drives
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RadioBackend {
    #[default]
    Serial,
    Loopback,
}

/// Radio transceiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default)]
    pub backend: RadioBackend,

    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Command values the aircraft applies while the link is lost
#[derive(Debug, Deserialize, Clone)]
pub struct FailsafeConfig {
    #[serde(default = "default_failsafe_channels")]
    pub channels: Vec<u16>,

    #[serde(default)]
    pub switches: u8,

    #[serde(default)]
    pub mode: u8,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_link_timeout_ms() -> u32 { 1000 }
fn default_loss_threshold() -> u16 { 10 }
fn default_update_rate_hz() -> u32 { 50 }
fn default_enable_statistics() -> bool { true }

fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }

fn default_failsafe_channels() -> Vec<u16> { CommandPayload::neutral().channels.to_vec() }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 1000 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            link_timeout_ms: default_link_timeout_ms(),
            loss_threshold: default_loss_threshold(),
            update_rate_hz: default_update_rate_hz(),
            enable_statistics: default_enable_statistics(),
        }
    }
}

impl LinkConfig {
    /// Period of the control loop
    pub fn update_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.update_rate_hz.max(1)))
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            backend: RadioBackend::default(),
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            channels: default_failsafe_channels(),
            switches: 0,
            mode: 0,
        }
    }
}

impl FailsafeConfig {
    /// Build the failsafe command
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if there are not exactly `NUM_CHANNELS`
    /// channels or a value exceeds `CHANNEL_VALUE_MAX`
    pub fn to_command(&self) -> Result<CommandPayload> {
        let channels: [u16; NUM_CHANNELS] = self.channels.as_slice().try_into().map_err(|_| {
            RcLinkError::InvalidParameter(format!(
                "failsafe needs {} channels, got {}",
                NUM_CHANNELS,
                self.channels.len()
            ))
        })?;

        if let Some(value) = channels.iter().find(|&&v| v > CHANNEL_VALUE_MAX) {
            return Err(RcLinkError::InvalidParameter(format!(
                "failsafe channel value {} exceeds {}",
                value, CHANNEL_VALUE_MAX
            )));
        }

        Ok(CommandPayload {
            channels,
            switches: self.switches,
            mode: self.mode,
        })
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> RcLinkError {
    RcLinkError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Link timing
        if self.link.link_timeout_ms == 0 || self.link.link_timeout_ms > 60000 {
            return Err(invalid("link_timeout_ms must be between 1 and 60000"));
        }

        if self.link.loss_threshold == 0 || self.link.loss_threshold > 1000 {
            return Err(invalid("loss_threshold must be between 1 and 1000"));
        }

        if self.link.update_rate_hz == 0 || self.link.update_rate_hz > 1000 {
            return Err(invalid("update_rate_hz must be between 1 and 1000"));
        }

        if self.link.update_period() >= Duration::from_millis(u64::from(self.link.link_timeout_ms)) {
            return Err(invalid("update period must be shorter than link_timeout_ms"));
        }

        // Radio
        if self.radio.backend == RadioBackend::Serial && self.radio.port.is_empty() {
            return Err(invalid("radio port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.radio.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                SUPPORTED_BAUD_RATES
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        if self.radio.timeout_ms == 0 || self.radio.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        // Failsafe
        self.failsafe.to_command().map_err(invalid)?;

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}
