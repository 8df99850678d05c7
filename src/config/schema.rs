//! Configuration schema definitions

use thiserror::Error;

/// Maximum client name length accepted by the audio server
pub const MAX_CLIENT_NAME_CHARS: usize = 63;

/// Default client name
pub const DEFAULT_CLIENT_NAME: &str = "balancer";

/// Errors found while validating startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Gain must be a finite, non-negative factor.
    #[error("'{0}' is not a valid value for gain (must be >= 0)")]
    InvalidGain(f64),

    /// Client name must not be empty.
    #[error("client name must not be empty")]
    EmptyClientName,
}

/// Settings consumed by the engine at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalancerConfig {
    /// MIDI channel to listen on (0-15, default: 0)
    pub channel: u8,

    /// Controller number for volume (default: 7)
    pub volume_cc: u8,

    /// Controller number for balance (default: 8)
    pub balance_cc: u8,

    /// Static gain applied to both channels (default: 1.0)
    pub gain: f64,
}

impl BalancerConfig {
    /// Validate the configuration
    ///
    /// Channel and controller numbers outside the MIDI range are accepted;
    /// they simply never match an incoming message.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(ConfigError::InvalidGain(self.gain));
        }
        Ok(())
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            volume_cc: 7,
            balance_cc: 8,
            gain: 1.0,
        }
    }
}

/// Audio and MIDI device settings
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// MIDI client name; the audio backend names its own stream clients
    pub client_name: String,

    /// Substring of the MIDI input port to connect (None = virtual port)
    pub midi_port: Option<String>,

    /// Input device name (None = default device)
    pub input_device: Option<String>,

    /// Output device name (None = default device)
    pub output_device: Option<String>,
}

impl HostConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_name.trim().is_empty() {
            return Err(ConfigError::EmptyClientName);
        }
        Ok(())
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            midi_port: None,
            input_device: None,
            output_device: None,
        }
    }
}
