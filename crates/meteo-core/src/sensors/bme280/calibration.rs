//! Factory calibration coefficients stored in the BME280's NVM.

use super::registers::*;
use crate::bus::{I2cBus, I2cChannel, RegisterDevice};
use crate::error::TransportError;

/// Compensation coefficients, read once after reset and never modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,

    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,

    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    /// 12-bit signed, split across 0xE4 and the low nibble of 0xE5.
    pub dig_h4: i16,
    /// 12-bit signed, split across the high nibble of 0xE5 and 0xE6.
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl Calibration {
    /// Read every coefficient from `device`, temperature first, then
    /// pressure, then humidity.
    pub fn read<C: I2cChannel>(
        device: &RegisterDevice,
        bus: &mut I2cBus<C>,
    ) -> Result<Self, TransportError> {
        let dig_t1 = device.read_u16_le(bus, DIG_T1)?;
        let dig_t2 = device.read_s16_le(bus, DIG_T2)?;
        let dig_t3 = device.read_s16_le(bus, DIG_T3)?;

        let dig_p1 = device.read_u16_le(bus, DIG_P1)?;
        let dig_p2 = device.read_s16_le(bus, DIG_P2)?;
        let dig_p3 = device.read_s16_le(bus, DIG_P3)?;
        let dig_p4 = device.read_s16_le(bus, DIG_P4)?;
        let dig_p5 = device.read_s16_le(bus, DIG_P5)?;
        let dig_p6 = device.read_s16_le(bus, DIG_P6)?;
        let dig_p7 = device.read_s16_le(bus, DIG_P7)?;
        let dig_p8 = device.read_s16_le(bus, DIG_P8)?;
        let dig_p9 = device.read_s16_le(bus, DIG_P9)?;

        let dig_h1 = device.read_u8(bus, DIG_H1)?;
        let dig_h2 = device.read_s16_le(bus, DIG_H2)?;
        let dig_h3 = device.read_u8(bus, DIG_H3)?;
        let dig_h4 = unpack_h4(device.read_s8(bus, DIG_H4)?, device.read_u8(bus, DIG_H4 + 1)?);
        let dig_h5 = unpack_h5(device.read_u8(bus, DIG_H5)?, device.read_s8(bus, DIG_H5 + 1)?);
        let dig_h6 = device.read_s8(bus, DIG_H6)?;

        Ok(Self {
            dig_t1,
            dig_t2,
            dig_t3,
            dig_p1,
            dig_p2,
            dig_p3,
            dig_p4,
            dig_p5,
            dig_p6,
            dig_p7,
            dig_p8,
            dig_p9,
            dig_h1,
            dig_h2,
            dig_h3,
            dig_h4,
            dig_h5,
            dig_h6,
        })
    }

    /// Lay the coefficients out the way the device stores them.
    ///
    /// Returns the `0x88..=0xA1` block and the `0xE1..=0xE7` block.
    pub fn to_registers(&self) -> ([u8; 26], [u8; 7]) {
        let mut low = [0u8; 26];
        let words = [
            self.dig_t1,
            self.dig_t2 as u16,
            self.dig_t3 as u16,
            self.dig_p1,
            self.dig_p2 as u16,
            self.dig_p3 as u16,
            self.dig_p4 as u16,
            self.dig_p5 as u16,
            self.dig_p6 as u16,
            self.dig_p7 as u16,
            self.dig_p8 as u16,
            self.dig_p9 as u16,
        ];
        for (i, word) in words.iter().enumerate() {
            low[i * 2..i * 2 + 2].copy_from_slice(&word.to_le_bytes());
        }
        // 0xA0 is reserved
        low[25] = self.dig_h1;

        let h2 = (self.dig_h2 as u16).to_le_bytes();
        let high = [
            h2[0],
            h2[1],
            self.dig_h3,
            (self.dig_h4 >> 4) as u8,
            (self.dig_h4 & 0x0F) as u8 | ((self.dig_h5 & 0x0F) << 4) as u8,
            (self.dig_h5 >> 4) as u8,
            self.dig_h6 as u8,
        ];

        (low, high)
    }
}

/// `H4 = (s8(0xE4) << 4) | (0xE5 & 0xF)`
const fn unpack_h4(e4: i8, e5: u8) -> i16 {
    ((e4 as i16) << 4) | (e5 & 0x0F) as i16
}

/// `H5 = (s8(0xE6) << 4) | (0xE5 >> 4)`
const fn unpack_h5(e5: u8, e6: i8) -> i16 {
    ((e6 as i16) << 4) | (e5 >> 4) as i16
}
