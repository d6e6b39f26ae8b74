//! Bench configuration
//!
//! Runtime knobs for the bench. The firmware builds this from constants
//! generated out of `bench.toml`; the same struct can be stored as a
//! compact postcard blob when the `serde` feature is enabled.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sensor::{SensorId, SensorSpec};

/// Upper bound on a postcard-encoded [`BenchConfig`]
pub const MAX_CONFIG_SIZE: usize = 64;

/// Firmware version reported in PONG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.major, self.minor, self.patch]
    }
}

impl Default for FirmwareVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Runtime configuration for the bench
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BenchConfig {
    pub version: FirmwareVersion,
    /// Blocking transmit timeout per response frame
    pub uart_tx_timeout_ms: u32,
    /// Spec applied to the thermal camera at boot
    pub thermal_spec: Option<SensorSpec>,
    /// Spec applied to the ranging sensor at boot
    pub ranging_spec: Option<SensorSpec>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            version: FirmwareVersion::default(),
            uart_tx_timeout_ms: 1000,
            thermal_spec: Some(SensorSpec::Thermal {
                target_temp: 2500,
                tolerance: 5000,
            }),
            ranging_spec: Some(SensorSpec::Ranging {
                target_dist: 500,
                tolerance: 2000,
            }),
        }
    }
}

impl BenchConfig {
    /// Boot-time spec for a sensor channel
    pub fn default_spec(&self, id: SensorId) -> Option<SensorSpec> {
        match id {
            SensorId::Mlx90640 => self.thermal_spec,
            SensorId::Vl53l0x => self.ranging_spec,
        }
    }
}

/// Configuration (de)serialization failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    Serialize,
    Deserialize,
}

#[cfg(feature = "serde")]
impl BenchConfig {
    /// Encode with postcard into `buffer`, returning the used prefix
    pub fn to_bytes<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::Serialize)
    }

    /// Decode a postcard blob written by [`BenchConfig::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.version.to_bytes(), [1, 0, 0]);
        assert_eq!(config.uart_tx_timeout_ms, 1000);
        assert!(matches!(
            config.default_spec(SensorId::Mlx90640),
            Some(SensorSpec::Thermal { .. })
        ));
        assert!(matches!(
            config.default_spec(SensorId::Vl53l0x),
            Some(SensorSpec::Ranging { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_postcard_roundtrip() {
        let config = BenchConfig {
            ranging_spec: None,
            ..BenchConfig::default()
        };
        let mut buffer = [0u8; MAX_CONFIG_SIZE];
        let len = config.to_bytes(&mut buffer).unwrap().len();
        assert_eq!(BenchConfig::from_bytes(&buffer[..len]), Ok(config));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_postcard_truncated() {
        let mut buffer = [0u8; MAX_CONFIG_SIZE];
        let len = BenchConfig::default().to_bytes(&mut buffer).unwrap().len();
        assert_eq!(
            BenchConfig::from_bytes(&buffer[..len - 1]),
            Err(ConfigError::Deserialize)
        );
    }
}
