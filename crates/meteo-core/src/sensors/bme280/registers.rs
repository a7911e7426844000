//! BME280 register map and sampling settings.

use serde::{Deserialize, Serialize};

/// Address with SDO tied low.
pub const ADDRESS_PRIMARY: u16 = 0x76;
/// Address with SDO tied high.
pub const ADDRESS_SECONDARY: u16 = 0x77;

pub const DIG_T1: u8 = 0x88;
pub const DIG_T2: u8 = 0x8A;
pub const DIG_T3: u8 = 0x8C;

pub const DIG_P1: u8 = 0x8E;
pub const DIG_P2: u8 = 0x90;
pub const DIG_P3: u8 = 0x92;
pub const DIG_P4: u8 = 0x94;
pub const DIG_P5: u8 = 0x96;
pub const DIG_P6: u8 = 0x98;
pub const DIG_P7: u8 = 0x9A;
pub const DIG_P8: u8 = 0x9C;
pub const DIG_P9: u8 = 0x9E;

pub const DIG_H1: u8 = 0xA1;
pub const DIG_H2: u8 = 0xE1;
pub const DIG_H3: u8 = 0xE3;
pub const DIG_H4: u8 = 0xE4;
pub const DIG_H5: u8 = 0xE5;
pub const DIG_H6: u8 = 0xE7;

pub const CHIP_ID: u8 = 0xD0;
pub const SOFT_RESET: u8 = 0xE0;
pub const CTRL_HUM: u8 = 0xF2;
pub const STATUS: u8 = 0xF3;
pub const CTRL_MEAS: u8 = 0xF4;
pub const CONFIG: u8 = 0xF5;
pub const PRESSURE_DATA: u8 = 0xF7;
pub const TEMPERATURE_DATA: u8 = 0xFA;
pub const HUMIDITY_DATA: u8 = 0xFD;

/// Value written to [`SOFT_RESET`] to reset the device.
pub const SOFT_RESET_COMMAND: u8 = 0xB6;

/// Chip id reported by a genuine BME280.
pub const CHIP_ID_BME280: u8 = 0x60;

/// Status bit set while NVM calibration data is being copied.
pub const STATUS_IM_UPDATE: u8 = 1 << 0;
/// Status bit set while a conversion is running.
pub const STATUS_MEASURING: u8 = 1 << 3;

/// Power mode held in the low two bits of `ctrl_meas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorMode {
    Sleep = 0b00,
    Forced = 0b01,
    Normal = 0b11,
}

impl SensorMode {
    /// Decode the mode bits of a `ctrl_meas` value. Both `0b01` and `0b10`
    /// select forced mode.
    pub const fn from_ctrl_meas(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::Sleep,
            0b11 => Self::Normal,
            _ => Self::Forced,
        }
    }
}

/// Raw values for the three sampling control registers.
///
/// Written after every reset in the order `ctrl_meas` (sleep), `ctrl_hum`,
/// `config`, `ctrl_meas`. The final `ctrl_meas` write is what latches the
/// humidity setting.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Bme280Settings {
    /// Humidity oversampling (`osrs_h`).
    pub ctrl_hum: u8,
    /// Standby time, IIR filter and SPI 3-wire bits.
    pub config: u8,
    /// Temperature/pressure oversampling and power mode.
    pub ctrl_meas: u8,
}

impl Default for Bme280Settings {
    fn default() -> Self {
        Self {
            ctrl_hum: 3,
            config: 109,
            // x4 temperature and pressure oversampling, forced mode
            ctrl_meas: 110,
        }
    }
}

impl Bme280Settings {
    pub const fn mode(&self) -> SensorMode {
        SensorMode::from_ctrl_meas(self.ctrl_meas)
    }
}
