//! Station configuration.
//!
//! Every field has a default matching the stock station (one BME280 at
//! 0x76 on bus 0, the analog probe on AIN1, 60 samples per 60 s period), so
//! a partial JSON document only needs to name what it changes.

use alloc::vec::Vec;
use core::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::sensors::ads1115::AuxConfig;
use crate::sensors::bme280::registers::ADDRESS_PRIMARY;
use crate::sensors::bme280::{Bme280Settings, PollConfig};

const MAX_ADDRESS: u16 = 0x7F;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one environmental sensor must be configured")]
    NoEnvironmentalSensors,
    #[error("device address {address:#04x} is outside the 7-bit range")]
    InvalidAddress { address: u16 },
    #[error("device address {address:#04x} is configured twice")]
    DuplicateAddress { address: u16 },
    #[error("reporting period and samples per period must both be non-zero")]
    EmptyPeriod,
    #[error("status polling needs at least one attempt")]
    NoPollAttempts,
    #[error("invalid auxiliary channel config: input {input}, full-scale mode {full_scale}")]
    InvalidAuxiliary { input: u8, full_scale: u8 },
}

/// Timing of the sampling loop.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SamplingConfig {
    /// Length of one reporting period.
    pub period_secs: u32,
    /// Sampling iterations averaged into one record.
    pub samples_per_period: u32,
    /// Pause between a fault and the next initialisation attempt.
    pub fault_backoff_secs: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_secs: 60,
            samples_per_period: 60,
            fault_backoff_secs: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Bus channel number.
    pub bus: u8,
    /// BME280 addresses, read in this order. The first is the primary.
    pub environmental: Vec<u16>,
    pub bme280: Bme280Settings,
    /// Busy-bit polling used during calibration and forced conversions.
    pub poll: PollConfig,
    /// `None` disables the analog channel.
    pub auxiliary: Option<AuxConfig>,
    pub sampling: SamplingConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            environmental: alloc::vec![ADDRESS_PRIMARY],
            bme280: Bme280Settings::default(),
            poll: PollConfig::default(),
            auxiliary: Some(AuxConfig::default()),
            sampling: SamplingConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environmental.is_empty() {
            return Err(ConfigError::NoEnvironmentalSensors);
        }
        if self.sampling.period_secs == 0 || self.sampling.samples_per_period == 0 {
            return Err(ConfigError::EmptyPeriod);
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::NoPollAttempts);
        }

        let aux_address = self.auxiliary.as_ref().map(|aux| aux.address);
        let addresses: Vec<u16> = self.environmental.iter().copied().chain(aux_address).collect();
        for (i, &address) in addresses.iter().enumerate() {
            if address > MAX_ADDRESS {
                return Err(ConfigError::InvalidAddress { address });
            }
            if addresses[..i].contains(&address) {
                return Err(ConfigError::DuplicateAddress { address });
            }
        }

        if let Some(aux) = &self.auxiliary {
            aux.validate().map_err(|_| ConfigError::InvalidAuxiliary {
                input: aux.input,
                full_scale: aux.full_scale,
            })?;
        }

        Ok(())
    }

    /// Time allotted to one sampling iteration.
    pub fn sample_budget(&self) -> Duration {
        Duration::from_secs(self.sampling.period_secs as u64)
            / self.sampling.samples_per_period.max(1)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_secs(self.sampling.fault_backoff_secs as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = MonitorConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.sample_budget(), Duration::from_secs(1));
        assert_eq!(config.fault_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_empty_sensor_list() {
        let config = MonitorConfig {
            environmental: Vec::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoEnvironmentalSensors));
    }

    #[test]
    fn test_rejects_duplicate_address() {
        let config = MonitorConfig {
            environmental: alloc::vec![0x76, 0x48],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateAddress { address: 0x48 })
        );
    }

    #[test]
    fn test_rejects_bad_auxiliary() {
        let config = MonitorConfig {
            auxiliary: Some(AuxConfig {
                full_scale: 9,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidAuxiliary {
                input: 1,
                full_scale: 9
            })
        );
    }

    #[test]
    fn test_rejects_empty_period() {
        let mut config = MonitorConfig::default();
        config.sampling.samples_per_period = 0;
        assert_eq!(config.validate(), Err(ConfigError::EmptyPeriod));
    }

    #[test]
    fn test_budget_division() {
        let mut config = MonitorConfig::default();
        config.sampling.period_secs = 10;
        config.sampling.samples_per_period = 4;
        assert_eq!(config.sample_budget(), Duration::from_millis(2500));
    }
}
