pub mod ads1115;
pub mod bme280;

use embedded_hal::delay::DelayNs;

use crate::bus::{I2cBus, I2cChannel};
use crate::error::DeviceError;

pub use ads1115::{Ads1115, AnalogProbe, AuxConfig};
pub use bme280::{Bme280, EnvironmentalReading, PhysicalReading};

/// A device that produces typed readings over a borrowed bus.
///
/// Sensors hold no bus handle of their own. The caller lends the bus for
/// each read so reads from several devices never overlap.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Take one reading.
    fn read<C: I2cChannel, D: DelayNs>(
        &self,
        bus: &mut I2cBus<C>,
        delay: &mut D,
    ) -> Result<Self::Readings, DeviceError>;

    /// Short name used in log messages.
    fn name(&self) -> &'static str;
}
