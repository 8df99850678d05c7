//! Configuration building and validation

mod schema;

pub use schema::*;

use log::warn;

/// Build a validated engine configuration from raw startup values
pub fn engine_config(channel: u8, volume_cc: u8, balance_cc: u8, gain: f64) -> Result<BalancerConfig, ConfigError> {
    let config = BalancerConfig {
        channel,
        volume_cc,
        balance_cc,
        gain,
    };
    config.validate()?;
    Ok(config)
}

/// Build a validated host configuration, truncating an overlong client name
pub fn host_config(
    client_name: &str,
    midi_port: Option<String>,
    input_device: Option<String>,
    output_device: Option<String>,
) -> Result<HostConfig, ConfigError> {
    let mut config = HostConfig {
        client_name: client_name.to_string(),
        midi_port,
        input_device,
        output_device,
    };

    if config.client_name.chars().count() > MAX_CLIENT_NAME_CHARS {
        config.client_name = config.client_name.chars().take(MAX_CLIENT_NAME_CHARS).collect();
        warn!(
            "Client name truncated to {} characters: '{}'",
            MAX_CLIENT_NAME_CHARS, config.client_name
        );
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults_valid() {
        let config = engine_config(0, 7, 8, 1.0).unwrap();
        assert_eq!(config, BalancerConfig::default());
    }

    #[test]
    fn test_engine_config_rejects_negative_gain() {
        let err = engine_config(0, 7, 8, -0.5).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGain(g) if g == -0.5));
    }

    #[test]
    fn test_engine_config_accepts_out_of_range_channel() {
        // Channels above 15 can never match a status byte, but are accepted
        let config = engine_config(20, 200, 8, 0.0).unwrap();
        assert_eq!(config.channel, 20);
        assert_eq!(config.volume_cc, 200);
    }

    #[test]
    fn test_host_config_truncates_long_name() {
        let long = "x".repeat(100);
        let config = host_config(&long, None, None, None).unwrap();
        assert_eq!(config.client_name.len(), MAX_CLIENT_NAME_CHARS);
    }

    #[test]
    fn test_host_config_rejects_empty_name() {
        let err = host_config("", None, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyClientName));
    }
}
