//! BME280 temperature, pressure and humidity sensor.
//!
//! [`Bme280::init`] resets the device, waits for the NVM copy to finish,
//! reads the calibration block and programs the sampling registers. After
//! that every [`Bme280::read`] produces one compensated
//! [`EnvironmentalReading`].

pub mod calibration;
pub mod compensation;
pub mod registers;

pub use calibration::Calibration;
pub use compensation::{
    ChannelFault, EnvironmentalReading, PhysicalReading, RawSample, Status, compensate,
};
pub use registers::{Bme280Settings, SensorMode};

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use self::registers::*;
use super::Sensor;
use crate::bus::{I2cBus, I2cChannel, RegisterDevice};
use crate::error::{DeviceError, TransportError};

/// Time the device needs after a soft reset before it answers again.
const STARTUP_MS: u32 = 2;
/// Settle time after the sampling registers are written.
const SETTLE_MS: u32 = 100;

/// Bounded status polling used while the device is busy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u32,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            max_attempts: 100,
        }
    }
}

/// A calibrated BME280 on a shared bus.
#[derive(Debug, Clone)]
pub struct Bme280 {
    device: RegisterDevice,
    calibration: Calibration,
    settings: Bme280Settings,
    poll: PollConfig,
    chip_id: u8,
}

impl Bme280 {
    /// Reset and configure the device at `address`.
    pub fn init<C: I2cChannel, D: DelayNs>(
        bus: &mut I2cBus<C>,
        delay: &mut D,
        address: u16,
        settings: Bme280Settings,
        poll: PollConfig,
    ) -> Result<Self, DeviceError> {
        let device = RegisterDevice::new(address);

        let chip_id = device.read_u8(bus, CHIP_ID)?;
        if chip_id != CHIP_ID_BME280 {
            warn!(
                "Device {:#04x} reports chip id {:#04x}, expected {:#04x}",
                address, chip_id, CHIP_ID_BME280
            );
        }

        device.write_u8(bus, SOFT_RESET, SOFT_RESET_COMMAND)?;
        delay.delay_ms(STARTUP_MS);

        if !wait_until_clear(&device, bus, delay, STATUS_IM_UPDATE, poll)? {
            return Err(DeviceError::CalibrationTimeout {
                address,
                attempts: poll.max_attempts,
            });
        }

        let calibration = Calibration::read(&device, bus)?;
        debug!("Device {:#04x} calibration: {:?}", address, calibration);

        // Sleep first so the new ctrl_hum value is latched by the final
        // ctrl_meas write.
        device.write_u8(bus, CTRL_MEAS, settings.ctrl_meas & !0b11)?;
        device.write_u8(bus, CTRL_HUM, settings.ctrl_hum)?;
        device.write_u8(bus, CONFIG, settings.config)?;
        device.write_u8(bus, CTRL_MEAS, settings.ctrl_meas)?;
        delay.delay_ms(SETTLE_MS);

        info!(
            "BME280 at {:#04x} ready (chip id {:#04x}, {:?} mode)",
            address,
            chip_id,
            settings.mode()
        );

        Ok(Self {
            device,
            calibration,
            settings,
            poll,
            chip_id,
        })
    }

    pub const fn address(&self) -> u16 {
        self.device.address()
    }

    pub const fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub const fn settings(&self) -> &Bme280Settings {
        &self.settings
    }

    pub const fn chip_id(&self) -> u8 {
        self.chip_id
    }

    /// Read the three ADC codes, triggering a conversion first in forced
    /// mode.
    pub fn read_raw<C: I2cChannel, D: DelayNs>(
        &self,
        bus: &mut I2cBus<C>,
        delay: &mut D,
    ) -> Result<RawSample, DeviceError> {
        if self.settings.mode() == SensorMode::Forced {
            self.device
                .write_u8(bus, CTRL_MEAS, self.settings.ctrl_meas)?;
            if !wait_until_clear(&self.device, bus, delay, STATUS_MEASURING, self.poll)? {
                return Err(DeviceError::MeasurementTimeout {
                    address: self.address(),
                    attempts: self.poll.max_attempts,
                });
            }
        }

        let temperature = self.device.read_u24_be(bus, TEMPERATURE_DATA)?;
        let pressure = self.device.read_u24_be(bus, PRESSURE_DATA)?;
        let humidity = self.device.read_u16_be(bus, HUMIDITY_DATA)?;

        Ok(RawSample {
            temperature,
            pressure,
            humidity,
        })
    }
}

impl Sensor for Bme280 {
    type Readings = EnvironmentalReading;

    fn read<C: I2cChannel, D: DelayNs>(
        &self,
        bus: &mut I2cBus<C>,
        delay: &mut D,
    ) -> Result<EnvironmentalReading, DeviceError> {
        let raw = self.read_raw(bus, delay)?;
        Ok(compensate(&raw, &self.calibration))
    }

    fn name(&self) -> &'static str {
        "BME280"
    }
}

/// Poll the status register until every bit in `mask` is clear.
///
/// Returns `false` once `poll.max_attempts` reads have all shown the bit
/// set.
fn wait_until_clear<C: I2cChannel, D: DelayNs>(
    device: &RegisterDevice,
    bus: &mut I2cBus<C>,
    delay: &mut D,
    mask: u8,
    poll: PollConfig,
) -> Result<bool, TransportError> {
    for attempt in 0..poll.max_attempts {
        if device.read_u8(bus, STATUS)? & mask == 0 {
            return Ok(true);
        }
        if attempt + 1 < poll.max_attempts {
            delay.delay_ms(poll.interval_ms);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BusEvent, DATASHEET_CALIBRATION, SimBme280, SimChannel, SimulatedBus};
    use embedded_hal_mock::eh1::delay::NoopDelay;

    const RAW: RawSample = RawSample {
        temperature: 519_888 << 4,
        pressure: 415_148 << 4,
        humidity: 30_000,
    };

    fn setup(device: SimBme280) -> (SimulatedBus, I2cBus<SimChannel>) {
        let sim = SimulatedBus::new().with_bme280(ADDRESS_PRIMARY, device);
        let mut provider = sim.clone();
        let bus = I2cBus::open(&mut provider, 1).unwrap();
        (sim, bus)
    }

    fn status_reads(sim: &SimulatedBus) -> usize {
        sim.events()
            .windows(2)
            .filter(|w| {
                matches!(&w[0], BusEvent::Write { bytes, .. } if bytes.as_slice() == [STATUS])
                    && matches!(w[1], BusEvent::Read { .. })
            })
            .count()
    }

    #[test]
    fn test_init_reads_calibration_and_configures() {
        let (sim, mut bus) = setup(SimBme280::new(DATASHEET_CALIBRATION, RAW));

        let sensor = Bme280::init(
            &mut bus,
            &mut NoopDelay::new(),
            ADDRESS_PRIMARY,
            Bme280Settings::default(),
            PollConfig::default(),
        )
        .unwrap();

        assert_eq!(sensor.calibration(), &DATASHEET_CALIBRATION);
        assert_eq!(sensor.chip_id(), CHIP_ID_BME280);
        assert_eq!(sim.peek(ADDRESS_PRIMARY, CTRL_HUM), Some(3));
        assert_eq!(sim.peek(ADDRESS_PRIMARY, CONFIG), Some(109));
        assert_eq!(sim.peek(ADDRESS_PRIMARY, CTRL_MEAS), Some(110));
    }

    #[test]
    fn test_configuration_write_order() {
        let (sim, mut bus) = setup(SimBme280::new(DATASHEET_CALIBRATION, RAW));
        Bme280::init(
            &mut bus,
            &mut NoopDelay::new(),
            ADDRESS_PRIMARY,
            Bme280Settings::default(),
            PollConfig::default(),
        )
        .unwrap();

        let writes: alloc::vec::Vec<_> = sim
            .events()
            .into_iter()
            .filter_map(|e| match e {
                BusEvent::Write { bytes, .. } if bytes.len() == 2 => Some((bytes[0], bytes[1])),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            [
                (SOFT_RESET, SOFT_RESET_COMMAND),
                (CTRL_MEAS, 108),
                (CTRL_HUM, 3),
                (CONFIG, 109),
                (CTRL_MEAS, 110),
            ]
        );
    }

    #[test]
    fn test_calibration_timeout_after_bounded_polls() {
        let (sim, mut bus) =
            setup(SimBme280::new(DATASHEET_CALIBRATION, RAW).with_calibrating_polls(u32::MAX));
        let poll = PollConfig {
            interval_ms: 10,
            max_attempts: 7,
        };

        let result = Bme280::init(
            &mut bus,
            &mut NoopDelay::new(),
            ADDRESS_PRIMARY,
            Bme280Settings::default(),
            poll,
        );

        assert_eq!(
            result.unwrap_err(),
            DeviceError::CalibrationTimeout {
                address: ADDRESS_PRIMARY,
                attempts: 7,
            }
        );
        assert_eq!(status_reads(&sim), 7);
    }

    #[test]
    fn test_forced_read_triggers_and_compensates() {
        let (sim, mut bus) =
            setup(SimBme280::new(DATASHEET_CALIBRATION, RAW).with_measuring_polls(3));
        let mut delay = NoopDelay::new();
        let sensor = Bme280::init(
            &mut bus,
            &mut delay,
            ADDRESS_PRIMARY,
            Bme280Settings::default(),
            PollConfig::default(),
        )
        .unwrap();
        sim.clear_events();

        let reading = sensor.read(&mut bus, &mut delay).unwrap();

        assert!((reading.temperature.unwrap() - 25.08).abs() < 0.005);
        assert!((reading.pressure.unwrap() - 1.006_533).abs() < 1e-5);
        assert!((reading.humidity.unwrap() - 54.997).abs() < 0.001);
        assert!(reading.status().is_ok());

        // trigger, 3 busy polls plus the one that reports done
        assert_eq!(status_reads(&sim), 4);
        assert!(matches!(
            &sim.events()[0],
            BusEvent::Write { bytes, .. } if bytes.as_slice() == [CTRL_MEAS, 110]
        ));
    }

    #[test]
    fn test_measurement_timeout() {
        let (sim, mut bus) = setup(SimBme280::new(DATASHEET_CALIBRATION, RAW));
        let mut delay = NoopDelay::new();
        let poll = PollConfig {
            interval_ms: 1,
            max_attempts: 5,
        };
        let sensor = Bme280::init(
            &mut bus,
            &mut delay,
            ADDRESS_PRIMARY,
            Bme280Settings::default(),
            poll,
        )
        .unwrap();
        sim.bme280_mut(ADDRESS_PRIMARY, |device| device.set_measuring_polls(u32::MAX));

        assert_eq!(
            sensor.read(&mut bus, &mut delay).unwrap_err(),
            DeviceError::MeasurementTimeout {
                address: ADDRESS_PRIMARY,
                attempts: 5,
            }
        );
    }

    #[test]
    fn test_normal_mode_does_not_trigger() {
        let (sim, mut bus) = setup(SimBme280::new(DATASHEET_CALIBRATION, RAW));
        let mut delay = NoopDelay::new();
        let settings = Bme280Settings {
            ctrl_meas: 111,
            ..Default::default()
        };
        let sensor = Bme280::init(
            &mut bus,
            &mut delay,
            ADDRESS_PRIMARY,
            settings,
            PollConfig::default(),
        )
        .unwrap();
        sim.clear_events();

        sensor.read_raw(&mut bus, &mut delay).unwrap();

        assert_eq!(status_reads(&sim), 0);
        assert!(
            !sim.events()
                .iter()
                .any(|e| matches!(e, BusEvent::Write { bytes, .. } if bytes.len() == 2))
        );
    }

    #[test]
    fn test_skipped_channels_are_reported() {
        let raw = RawSample {
            pressure: compensation::SKIPPED_24,
            ..RAW
        };
        let (_sim, mut bus) = setup(SimBme280::new(DATASHEET_CALIBRATION, raw));
        let mut delay = NoopDelay::new();
        let sensor = Bme280::init(
            &mut bus,
            &mut delay,
            ADDRESS_PRIMARY,
            Bme280Settings::default(),
            PollConfig::default(),
        )
        .unwrap();

        let reading = sensor.read(&mut bus, &mut delay).unwrap();
        assert_eq!(reading.pressure, Err(ChannelFault::PressureDisabled));
        assert_eq!(reading.status(), Status::PRESSURE_DISABLED);
    }

    #[test]
    fn test_missing_device_fails_init() {
        let sim = SimulatedBus::new();
        let mut provider = sim.clone();
        let mut bus = I2cBus::open(&mut provider, 1).unwrap();

        let err = Bme280::init(
            &mut bus,
            &mut NoopDelay::new(),
            ADDRESS_PRIMARY,
            Bme280Settings::default(),
            PollConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.transport(),
            Some(TransportError::ShortTransfer { .. })
        ));
    }
}
