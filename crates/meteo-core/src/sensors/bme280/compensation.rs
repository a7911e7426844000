//! Fixed-point compensation of raw BME280 ADC codes.
//!
//! Temperature runs first and yields `t_fine`, which both the pressure and
//! the humidity stage depend on. Intermediates keep the integer widths of the
//! datasheet formulas (32-bit for temperature and humidity, 64-bit for
//! pressure) and wrap on overflow, so results are bit-exact and no
//! coefficient set can cause a panic.

use core::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use super::calibration::Calibration;

/// Raw 24-bit code reported when temperature or pressure is skipped.
pub const SKIPPED_24: u32 = 0x80_0000;
/// Raw 16-bit code reported when humidity is skipped.
pub const SKIPPED_16: u16 = 0x8000;

/// Largest humidity value before the final scaling, 100 %RH in Q22.10 << 12.
const HUMIDITY_MAX: i32 = 419_430_400;

/// ADC codes read in one transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    /// 20 significant bits, left-aligned in 24.
    pub temperature: u32,
    /// 20 significant bits, left-aligned in 24.
    pub pressure: u32,
    pub humidity: u16,
}

/// Why a channel produced no physical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFault {
    TemperatureDisabled,
    /// Pressure or humidity could not run because temperature was skipped.
    FineTemperatureUnavailable,
    PressureDisabled,
    PressureDivideByZero,
    HumidityDisabled,
}

impl ChannelFault {
    /// Per-stage failure code.
    pub const fn code(self) -> i32 {
        match self {
            Self::TemperatureDisabled | Self::FineTemperatureUnavailable => -1,
            Self::PressureDisabled => -2,
            Self::PressureDivideByZero => -3,
            Self::HumidityDisabled => -4,
        }
    }

    pub const fn status(self) -> Status {
        match self {
            Self::TemperatureDisabled | Self::FineTemperatureUnavailable => {
                Status::TEMPERATURE_DISABLED
            }
            Self::PressureDisabled => Status::PRESSURE_DISABLED,
            Self::PressureDivideByZero => Status::PRESSURE_DIVIDE_BY_ZERO,
            Self::HumidityDisabled => Status::HUMIDITY_DISABLED,
        }
    }
}

/// One physical value, or the reason it is missing.
pub type PhysicalReading = Result<f32, ChannelFault>;

/// Set of channel faults seen in a reading or a whole period. Zero means
/// every channel succeeded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Status(u8);

impl Status {
    pub const OK: Self = Self(0);
    pub const TEMPERATURE_DISABLED: Self = Self(1 << 0);
    pub const PRESSURE_DISABLED: Self = Self(1 << 1);
    pub const PRESSURE_DIVIDE_BY_ZERO: Self = Self(1 << 2);
    pub const HUMIDITY_DISABLED: Self = Self(1 << 3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flag for `reading`, empty when it holds a value.
    pub fn of(reading: &PhysicalReading) -> Self {
        match reading {
            Ok(_) => Self::OK,
            Err(fault) => fault.status(),
        }
    }
}

impl BitOr for Status {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compensated temperature, pressure and humidity from one raw sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentalReading {
    /// Degrees Celsius.
    pub temperature: PhysicalReading,
    /// Bar.
    pub pressure: PhysicalReading,
    /// Percent relative humidity.
    pub humidity: PhysicalReading,
}

impl EnvironmentalReading {
    pub fn status(&self) -> Status {
        Status::of(&self.temperature) | Status::of(&self.pressure) | Status::of(&self.humidity)
    }
}

/// Temperature stage output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temperature {
    /// Shared input of the pressure and humidity stages.
    pub t_fine: i32,
    /// Hundredths of a degree Celsius.
    pub centi_celsius: i32,
}

impl Temperature {
    pub fn celsius(&self) -> f32 {
        self.centi_celsius as f32 / 100.0
    }
}

/// Run all three stages.
///
/// When temperature is skipped the other two stages still report their own
/// skip codes, otherwise they fail with
/// [`ChannelFault::FineTemperatureUnavailable`].
pub fn compensate(raw: &RawSample, calibration: &Calibration) -> EnvironmentalReading {
    let temperature = compensate_temperature(raw.temperature, calibration);

    let (pressure, humidity) = match temperature {
        Ok(t) => (
            compensate_pressure(raw.pressure, t.t_fine, calibration).map(pascal_q24_8_to_bar),
            compensate_humidity(raw.humidity, t.t_fine, calibration).map(humidity_q22_10_to_percent),
        ),
        Err(_) => (
            if raw.pressure == SKIPPED_24 {
                Err(ChannelFault::PressureDisabled)
            } else {
                Err(ChannelFault::FineTemperatureUnavailable)
            },
            if raw.humidity == SKIPPED_16 {
                Err(ChannelFault::HumidityDisabled)
            } else {
                Err(ChannelFault::FineTemperatureUnavailable)
            },
        ),
    };

    EnvironmentalReading {
        temperature: temperature.map(|t| t.celsius()),
        pressure,
        humidity,
    }
}

pub fn compensate_temperature(
    adc: u32,
    calibration: &Calibration,
) -> Result<Temperature, ChannelFault> {
    if adc == SKIPPED_24 {
        return Err(ChannelFault::TemperatureDisabled);
    }

    let adc_t = (adc >> 4) as i32;
    let t1 = calibration.dig_t1 as i32;
    let t2 = calibration.dig_t2 as i32;
    let t3 = calibration.dig_t3 as i32;

    let var1 = ((adc_t / 8) - t1 * 2).wrapping_mul(t2) / 2048;
    let var2 = (adc_t / 16) - t1;
    let var2 = (var2.wrapping_mul(var2) / 4096).wrapping_mul(t3) / 16384;

    let t_fine = var1.wrapping_add(var2);
    let centi_celsius = t_fine.wrapping_mul(5).wrapping_add(128) / 256;

    Ok(Temperature {
        t_fine,
        centi_celsius,
    })
}

/// Pressure in Pascal as unsigned Q24.8.
pub fn compensate_pressure(
    adc: u32,
    t_fine: i32,
    calibration: &Calibration,
) -> Result<u32, ChannelFault> {
    if adc == SKIPPED_24 {
        return Err(ChannelFault::PressureDisabled);
    }

    let adc_p = (adc >> 4) as i64;
    let p1 = calibration.dig_p1 as i64;
    let p2 = calibration.dig_p2 as i64;
    let p3 = calibration.dig_p3 as i64;
    let p4 = calibration.dig_p4 as i64;
    let p5 = calibration.dig_p5 as i64;
    let p6 = calibration.dig_p6 as i64;
    let p7 = calibration.dig_p7 as i64;
    let p8 = calibration.dig_p8 as i64;
    let p9 = calibration.dig_p9 as i64;

    let mut var1 = t_fine as i64 - 128_000;
    let mut var2 = var1.wrapping_mul(var1).wrapping_mul(p6);
    var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 17);
    var2 = var2.wrapping_add(p4 << 35);
    var1 = (var1.wrapping_mul(var1).wrapping_mul(p3) >> 8).wrapping_add(var1.wrapping_mul(p2) << 12);
    var1 = (1i64 << 47).wrapping_add(var1).wrapping_mul(p1) >> 33;

    if var1 == 0 {
        return Err(ChannelFault::PressureDivideByZero);
    }

    let mut p = 1_048_576 - adc_p;
    p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);
    var1 = p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
    var2 = p8.wrapping_mul(p) >> 19;
    p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(p7 << 4);

    Ok(p as u32)
}

/// Relative humidity in percent as unsigned Q22.10.
pub fn compensate_humidity(
    adc: u16,
    t_fine: i32,
    calibration: &Calibration,
) -> Result<u32, ChannelFault> {
    if adc == SKIPPED_16 {
        return Err(ChannelFault::HumidityDisabled);
    }

    let adc_h = adc as i32;
    let h1 = calibration.dig_h1 as i32;
    let h2 = calibration.dig_h2 as i32;
    let h3 = calibration.dig_h3 as i32;
    let h4 = calibration.dig_h4 as i32;
    let h5 = calibration.dig_h5 as i32;
    let h6 = calibration.dig_h6 as i32;

    let v = t_fine.wrapping_sub(76_800);
    let scaled = (adc_h << 14)
        .wrapping_sub(h4 << 20)
        .wrapping_sub(h5.wrapping_mul(v))
        .wrapping_add(16_384)
        >> 15;
    let slope = ((v.wrapping_mul(h6) >> 10).wrapping_mul((v.wrapping_mul(h3) >> 11).wrapping_add(32_768))
        >> 10)
        .wrapping_add(2_097_152)
        .wrapping_mul(h2)
        .wrapping_add(8_192)
        >> 14;

    let mut v = scaled.wrapping_mul(slope);
    v = v.wrapping_sub(((v >> 15).wrapping_mul(v >> 15) >> 7).wrapping_mul(h1) >> 4);
    let v = v.clamp(0, HUMIDITY_MAX);

    Ok((v >> 12) as u32)
}

/// Q24.8 Pascal to bar.
pub fn pascal_q24_8_to_bar(pressure: u32) -> f32 {
    (pressure as f64 / 256.0 / 100_000.0) as f32
}

/// Q22.10 percent to percent.
pub fn humidity_q22_10_to_percent(humidity: u32) -> f32 {
    humidity as f32 / 1024.0
}
