//! ADS1115 16-bit ADC used as the auxiliary analog temperature channel.
//!
//! The converter runs continuously after [`Ads1115::configure`] and the
//! pointer register is left on the conversion result, so every later read
//! is a plain two-byte read without a register selector.

use embedded_hal::delay::DelayNs;
use log::info;
use serde::{Deserialize, Serialize};

use super::Sensor;
use crate::bus::{I2cBus, I2cChannel, RegisterDevice};
use crate::error::DeviceError;

/// Address with ADDR tied to ground.
pub const DEFAULT_ADDRESS: u16 = 0x48;

const POINTER_CONVERSION: u8 = 0x00;
const POINTER_CONFIG: u8 = 0x01;

/// Full-scale range in volts, indexed by PGA mode.
pub const FULL_SCALES: [f32; 6] = [6.144, 4.096, 2.048, 1.024, 0.512, 0.256];

/// Single-ended inputs AIN0 to AIN3.
pub const INPUT_COUNT: u8 = 4;

/// Linear voltage to temperature mapping of the analog probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AnalogProbe {
    /// Temperature at 0 V, degrees Celsius.
    pub offset: f32,
    /// Temperature range covered by the full supply voltage.
    pub span: f32,
    /// Probe supply voltage.
    pub supply: f32,
}

impl Default for AnalogProbe {
    fn default() -> Self {
        Self {
            offset: -66.875,
            span: 218.75,
            supply: 3.3,
        }
    }
}

impl AnalogProbe {
    pub fn temperature(&self, volts: f32) -> f32 {
        self.offset + self.span * volts / self.supply
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AuxConfig {
    pub address: u16,
    /// Single-ended input, 0 to 3.
    pub input: u8,
    /// Index into [`FULL_SCALES`].
    pub full_scale: u8,
    pub probe: AnalogProbe,
}

impl Default for AuxConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            input: 1,
            full_scale: 2,
            probe: AnalogProbe::default(),
        }
    }
}

impl AuxConfig {
    pub fn validate(&self) -> Result<(), DeviceError> {
        config_word(self.input, self.full_scale).map(|_| ())
    }
}

/// Config register value for `input` and `full_scale`: single-shot start
/// bit, single-ended mux, PGA, continuous mode, 128 SPS, comparator off.
pub fn config_word(input: u8, full_scale: u8) -> Result<[u8; 2], DeviceError> {
    if input >= INPUT_COUNT || full_scale as usize >= FULL_SCALES.len() {
        return Err(DeviceError::InvalidAuxConfig { input, full_scale });
    }
    Ok([0b1100_0000 + 0x10 * input + 0x02 * full_scale, 0x83])
}

/// Volts per LSB for `full_scale`.
pub fn conversion_factor(full_scale: u8) -> Option<f32> {
    FULL_SCALES
        .get(full_scale as usize)
        .map(|range| range / 32768.0)
}

/// A configured ADS1115.
#[derive(Debug, Clone, Copy)]
pub struct Ads1115 {
    device: RegisterDevice,
    factor: f32,
    probe: AnalogProbe,
}

impl Ads1115 {
    /// Validate `config`, write the config register and leave the pointer
    /// on the conversion register.
    pub fn configure<C: I2cChannel>(
        bus: &mut I2cBus<C>,
        config: &AuxConfig,
    ) -> Result<Self, DeviceError> {
        let [hi, lo] = config_word(config.input, config.full_scale)?;
        let factor = conversion_factor(config.full_scale).ok_or(DeviceError::InvalidAuxConfig {
            input: config.input,
            full_scale: config.full_scale,
        })?;

        let device = RegisterDevice::new(config.address);
        device.write_bytes(bus, &[POINTER_CONFIG, hi, lo])?;
        device.write_bytes(bus, &[POINTER_CONVERSION])?;

        info!(
            "ADS1115 at {:#04x} on AIN{} with +/-{} V range",
            config.address, config.input, FULL_SCALES[config.full_scale as usize]
        );

        Ok(Self {
            device,
            factor,
            probe: config.probe,
        })
    }

    pub const fn address(&self) -> u16 {
        self.device.address()
    }

    pub const fn conversion_factor(&self) -> f32 {
        self.factor
    }

    /// Latest signed conversion code.
    pub fn read_code<C: I2cChannel>(&self, bus: &mut I2cBus<C>) -> Result<i16, DeviceError> {
        Ok(i16::from_be_bytes(self.device.read_raw(bus)?))
    }

    pub fn read_voltage<C: I2cChannel>(&self, bus: &mut I2cBus<C>) -> Result<f32, DeviceError> {
        Ok(self.read_code(bus)? as f32 * self.factor)
    }

    pub fn read_temperature<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
    ) -> Result<f32, DeviceError> {
        Ok(self.probe.temperature(self.read_voltage(bus)?))
    }
}

impl Sensor for Ads1115 {
    type Readings = f32;

    fn read<C: I2cChannel, D: DelayNs>(
        &self,
        bus: &mut I2cBus<C>,
        _delay: &mut D,
    ) -> Result<f32, DeviceError> {
        self.read_temperature(bus)
    }

    fn name(&self) -> &'static str {
        "ADS1115"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BusEvent, SimAds1115, SimulatedBus};

    #[test]
    fn test_config_word_for_every_combination() {
        for input in 0..4u8 {
            for full_scale in 0..6u8 {
                let [hi, lo] = config_word(input, full_scale).unwrap();
                assert_eq!(hi, 0xC0 + 0x10 * input + 0x02 * full_scale);
                assert_eq!(lo, 0x83);
                assert_eq!(
                    conversion_factor(full_scale),
                    Some(FULL_SCALES[full_scale as usize] / 32768.0)
                );
            }
        }
        assert_eq!(config_word(1, 2).unwrap(), [0xD4, 0x83]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert_eq!(
            config_word(4, 0),
            Err(DeviceError::InvalidAuxConfig {
                input: 4,
                full_scale: 0
            })
        );
        assert!(config_word(0, 6).is_err());
        assert!(conversion_factor(6).is_none());

        let sim = SimulatedBus::new().with_ads1115(DEFAULT_ADDRESS, SimAds1115::new(0));
        let mut provider = sim.clone();
        let mut bus = I2cBus::open(&mut provider, 1).unwrap();
        let config = AuxConfig {
            input: 7,
            ..Default::default()
        };
        assert!(Ads1115::configure(&mut bus, &config).is_err());
        assert!(sim.events().is_empty());
    }

    #[test]
    fn test_configure_frames() {
        let sim = SimulatedBus::new().with_ads1115(DEFAULT_ADDRESS, SimAds1115::new(0));
        let mut provider = sim.clone();
        let mut bus = I2cBus::open(&mut provider, 1).unwrap();

        Ads1115::configure(&mut bus, &AuxConfig::default()).unwrap();

        assert_eq!(
            sim.events(),
            [
                BusEvent::Address(DEFAULT_ADDRESS),
                BusEvent::Write {
                    address: DEFAULT_ADDRESS,
                    bytes: alloc::vec![0x01, 0xD4, 0x83],
                },
                BusEvent::Write {
                    address: DEFAULT_ADDRESS,
                    bytes: alloc::vec![0x00],
                },
            ]
        );
    }

    #[test]
    fn test_read_temperature() {
        // 1.65 V on the 2.048 V range is code 26400
        let sim = SimulatedBus::new().with_ads1115(DEFAULT_ADDRESS, SimAds1115::new(26_400));
        let mut provider = sim.clone();
        let mut bus = I2cBus::open(&mut provider, 1).unwrap();
        let adc = Ads1115::configure(&mut bus, &AuxConfig::default()).unwrap();

        let volts = adc.read_voltage(&mut bus).unwrap();
        assert!((volts - 1.65).abs() < 1e-3);

        let celsius = adc.read_temperature(&mut bus).unwrap();
        assert!((celsius - 42.5).abs() < 0.1);
    }

    #[test]
    fn test_negative_code() {
        let sim = SimulatedBus::new().with_ads1115(DEFAULT_ADDRESS, SimAds1115::new(-32_768));
        let mut provider = sim.clone();
        let mut bus = I2cBus::open(&mut provider, 1).unwrap();
        let adc = Ads1115::configure(&mut bus, &AuxConfig::default()).unwrap();

        assert_eq!(adc.read_code(&mut bus).unwrap(), -32_768);
        assert!((adc.read_voltage(&mut bus).unwrap() + 2.048).abs() < 1e-6);
    }

    #[test]
    fn test_device_sees_config_and_code_changes() {
        let sim = SimulatedBus::new().with_ads1115(DEFAULT_ADDRESS, SimAds1115::new(100));
        let mut provider = sim.clone();
        let mut bus = I2cBus::open(&mut provider, 1).unwrap();
        let config = AuxConfig {
            input: 3,
            full_scale: 5,
            ..Default::default()
        };
        let adc = Ads1115::configure(&mut bus, &config).unwrap();

        assert_eq!(
            sim.ads1115_mut(DEFAULT_ADDRESS, |device| device.config()),
            Some([0xFA, 0x83])
        );
        assert_eq!(adc.read_code(&mut bus).unwrap(), 100);

        sim.ads1115_mut(DEFAULT_ADDRESS, |device| device.set_code(-5));
        assert_eq!(adc.read_code(&mut bus).unwrap(), -5);
        assert!(sim.ads1115_mut(0x49, |device| device.config()).is_none());
    }

    #[test]
    fn test_probe_transform() {
        let probe = AnalogProbe::default();
        assert!((probe.temperature(0.0) + 66.875).abs() < 1e-6);
        assert!((probe.temperature(3.3) - 151.875).abs() < 1e-4);
    }
}
