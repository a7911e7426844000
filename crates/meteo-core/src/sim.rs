//! In-memory bus with simulated peripherals.
//!
//! Backs the unit and integration tests and the logger's `--simulate` mode.
//! A [`SimulatedBus`] is a cheap handle onto shared state: clone it, hand
//! one clone to the code under test as its [`BusProvider`], and keep the
//! other to inject faults and inspect the recorded traffic.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::bus::{BusProvider, I2cChannel};
use crate::error::TransportError;
use crate::sensors::bme280::compensation::{RawSample, SKIPPED_24};
use crate::sensors::bme280::registers::*;
use crate::sensors::bme280::{Calibration, SensorMode};

/// Coefficients from the Bosch datasheet worked example.
pub const DATASHEET_CALIBRATION: Calibration = Calibration {
    dig_t1: 27504,
    dig_t2: 26435,
    dig_t3: -1000,
    dig_p1: 36477,
    dig_p2: -10685,
    dig_p3: 3024,
    dig_p4: 2855,
    dig_p5: 140,
    dig_p6: -7,
    dig_p7: 15500,
    dig_p8: -14600,
    dig_p9: 6000,
    dig_h1: 75,
    dig_h2: 362,
    dig_h3: 0,
    dig_h4: 313,
    dig_h5: 50,
    dig_h6: 30,
};

/// Highest valid 7-bit address.
const MAX_ADDRESS: u16 = 0x7F;

/// One observable operation on the simulated channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Address(u16),
    Write { address: u16, bytes: Vec<u8> },
    Read { address: u16, len: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Successful channel opens.
    pub opens: u32,
    /// Every `set_slave_address` call, including rejected ones.
    pub address_calls: u32,
    pub writes: u32,
    pub reads: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    InvalidAddress(u16),
}

/// Slow triangle wave added to simulated readings.
#[derive(Debug, Clone, Copy, Default)]
struct Wander {
    amplitude: i32,
    tick: u32,
}

impl Wander {
    const HALF_PERIOD: i32 = 64;

    fn next(&mut self) -> i32 {
        if self.amplitude == 0 {
            return 0;
        }
        let phase = (self.tick % (2 * Self::HALF_PERIOD as u32)) as i32;
        self.tick = self.tick.wrapping_add(1);
        let ramp = if phase < Self::HALF_PERIOD {
            phase
        } else {
            2 * Self::HALF_PERIOD - phase
        };
        self.amplitude * (2 * ramp - Self::HALF_PERIOD) / Self::HALF_PERIOD
    }
}

/// Register-level BME280 model.
#[derive(Debug, Clone)]
pub struct SimBme280 {
    registers: [u8; 256],
    pointer: u8,
    raw: RawSample,
    calibrating_polls: u32,
    calibrating_remaining: u32,
    measuring_polls: u32,
    measuring_remaining: u32,
    wander: Wander,
}

impl SimBme280 {
    pub fn new(calibration: Calibration, raw: RawSample) -> Self {
        let mut registers = [0u8; 256];
        let (low, high) = calibration.to_registers();
        let low_start = DIG_T1 as usize;
        let high_start = DIG_H2 as usize;
        registers[low_start..low_start + low.len()].copy_from_slice(&low);
        registers[high_start..high_start + high.len()].copy_from_slice(&high);
        registers[CHIP_ID as usize] = CHIP_ID_BME280;

        let mut device = Self {
            registers,
            pointer: 0,
            raw,
            calibrating_polls: 1,
            calibrating_remaining: 0,
            measuring_polls: 1,
            measuring_remaining: 0,
            wander: Wander::default(),
        };
        device.latch(raw);
        device
    }

    /// Status reads that report the NVM copy as running after each reset.
    pub fn with_calibrating_polls(mut self, polls: u32) -> Self {
        self.calibrating_polls = polls;
        self
    }

    /// Status reads that report a conversion as running after each forced
    /// trigger.
    pub fn with_measuring_polls(mut self, polls: u32) -> Self {
        self.measuring_polls = polls;
        self
    }

    /// Vary the temperature code by up to `amplitude` around its base value.
    pub fn with_wander(mut self, amplitude: i32) -> Self {
        self.wander.amplitude = amplitude;
        self
    }

    pub fn set_measuring_polls(&mut self, polls: u32) {
        self.measuring_polls = polls;
    }

    pub fn set_raw(&mut self, raw: RawSample) {
        self.raw = raw;
        self.latch(raw);
    }

    fn latch(&mut self, raw: RawSample) {
        let [_, p0, p1, p2] = raw.pressure.to_be_bytes();
        let [_, t0, t1, t2] = raw.temperature.to_be_bytes();
        let [h0, h1] = raw.humidity.to_be_bytes();
        let data = [p0, p1, p2, t0, t1, t2, h0, h1];
        let start = PRESSURE_DATA as usize;
        self.registers[start..start + data.len()].copy_from_slice(&data);
    }

    fn measure(&mut self) {
        let mut raw = self.raw;
        let offset = self.wander.next();
        if offset != 0 && raw.temperature != SKIPPED_24 {
            let code = (raw.temperature >> 4) as i32 + offset;
            raw.temperature = (code.clamp(0, 0xF_FFFF) as u32) << 4;
        }
        self.latch(raw);
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Some(&register) = bytes.first() {
            self.pointer = register;
        }

        // Writes are register/value pairs.
        for pair in bytes.chunks_exact(2) {
            let (register, value) = (pair[0], pair[1]);
            match register {
                SOFT_RESET if value == SOFT_RESET_COMMAND => {
                    self.registers[CTRL_HUM as usize] = 0;
                    self.registers[CTRL_MEAS as usize] = 0;
                    self.registers[CONFIG as usize] = 0;
                    self.calibrating_remaining = self.calibrating_polls;
                    self.measuring_remaining = 0;
                }
                CTRL_MEAS => {
                    self.registers[CTRL_MEAS as usize] = value;
                    if SensorMode::from_ctrl_meas(value) == SensorMode::Forced {
                        self.measuring_remaining = self.measuring_polls;
                        self.measure();
                    }
                }
                CTRL_HUM | CONFIG => self.registers[register as usize] = value,
                _ => {}
            }
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = if self.pointer == STATUS {
                let mut status = 0;
                if self.calibrating_remaining > 0 {
                    status |= STATUS_IM_UPDATE;
                    self.calibrating_remaining -= 1;
                }
                if self.measuring_remaining > 0 {
                    status |= STATUS_MEASURING;
                    self.measuring_remaining -= 1;
                }
                status
            } else {
                if self.pointer == TEMPERATURE_DATA
                    && SensorMode::from_ctrl_meas(self.registers[CTRL_MEAS as usize])
                        == SensorMode::Normal
                {
                    self.measure();
                }
                self.registers[self.pointer as usize]
            };
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

/// Register-level ADS1115 model.
#[derive(Debug, Clone)]
pub struct SimAds1115 {
    pointer: u8,
    config: [u8; 2],
    code: i16,
    wander: Wander,
}

impl SimAds1115 {
    pub fn new(code: i16) -> Self {
        Self {
            pointer: 0,
            // power-on default
            config: [0x85, 0x83],
            code,
            wander: Wander::default(),
        }
    }

    pub fn with_wander(mut self, amplitude: i32) -> Self {
        self.wander.amplitude = amplitude;
        self
    }

    pub fn set_code(&mut self, code: i16) {
        self.code = code;
    }

    pub const fn config(&self) -> [u8; 2] {
        self.config
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&pointer, values)) = bytes.split_first() else {
            return;
        };
        self.pointer = pointer & 0b11;
        if self.pointer == 1 && values.len() >= 2 {
            self.config = [values[0], values[1]];
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        let word = match self.pointer {
            0 => {
                let code = self.code as i32 + self.wander.next();
                (code.clamp(i16::MIN as i32, i16::MAX as i32) as i16).to_be_bytes()
            }
            1 => self.config,
            _ => [0, 0],
        };
        for (byte, value) in buffer.iter_mut().zip(word.iter().cycle()) {
            *byte = *value;
        }
    }
}

#[derive(Debug, Clone)]
enum SimDevice {
    /// Plain auto-incrementing register file.
    Memory { registers: [u8; 256], pointer: u8 },
    Bme280(SimBme280),
    Ads1115(SimAds1115),
}

impl SimDevice {
    fn write(&mut self, bytes: &[u8]) {
        match self {
            Self::Memory { registers, pointer } => {
                if let Some((&first, rest)) = bytes.split_first() {
                    *pointer = first;
                    for value in rest {
                        registers[*pointer as usize] = *value;
                        *pointer = pointer.wrapping_add(1);
                    }
                }
            }
            Self::Bme280(device) => device.write(bytes),
            Self::Ads1115(device) => device.write(bytes),
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        match self {
            Self::Memory { registers, pointer } => {
                for byte in buffer.iter_mut() {
                    *byte = registers[*pointer as usize];
                    *pointer = pointer.wrapping_add(1);
                }
            }
            Self::Bme280(device) => device.read(buffer),
            Self::Ads1115(device) => device.read(buffer),
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    devices: BTreeMap<u16, SimDevice>,
    events: Vec<BusEvent>,
    stats: BusStats,
    /// Transfers left before the injected fault fires.
    fail_after: Option<u32>,
    failing_opens: u32,
}

impl SimState {
    /// Whether this transfer should come back empty.
    fn take_fault(&mut self) -> bool {
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                true
            }
            Some(n) => {
                self.fail_after = Some(n - 1);
                false
            }
            None => false,
        }
    }
}

/// Shared handle onto a simulated bus and its devices.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_device(self, address: u16) -> Self {
        self.attach(
            address,
            SimDevice::Memory {
                registers: [0; 256],
                pointer: 0,
            },
        )
    }

    pub fn with_bme280(self, address: u16, device: SimBme280) -> Self {
        self.attach(address, SimDevice::Bme280(device))
    }

    pub fn with_ads1115(self, address: u16, device: SimAds1115) -> Self {
        self.attach(address, SimDevice::Ads1115(device))
    }

    fn attach(self, address: u16, device: SimDevice) -> Self {
        self.state.borrow_mut().devices.insert(address, device);
        self
    }

    /// Set a register of a memory device directly, without recording traffic.
    pub fn poke(&self, address: u16, register: u8, value: u8) {
        if let Some(SimDevice::Memory { registers, .. }) =
            self.state.borrow_mut().devices.get_mut(&address)
        {
            registers[register as usize] = value;
        }
    }

    /// Current value of a register, for memory devices and BME280s.
    pub fn peek(&self, address: u16, register: u8) -> Option<u8> {
        match self.state.borrow().devices.get(&address)? {
            SimDevice::Memory { registers, .. } => Some(registers[register as usize]),
            SimDevice::Bme280(device) => Some(device.registers[register as usize]),
            SimDevice::Ads1115(_) => None,
        }
    }

    /// Run `f` against the BME280 model at `address`, if there is one.
    pub fn bme280_mut<R>(&self, address: u16, f: impl FnOnce(&mut SimBme280) -> R) -> Option<R> {
        match self.state.borrow_mut().devices.get_mut(&address)? {
            SimDevice::Bme280(device) => Some(f(device)),
            _ => None,
        }
    }

    pub fn ads1115_mut<R>(
        &self,
        address: u16,
        f: impl FnOnce(&mut SimAds1115) -> R,
    ) -> Option<R> {
        match self.state.borrow_mut().devices.get_mut(&address)? {
            SimDevice::Ads1115(device) => Some(f(device)),
            _ => None,
        }
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn stats(&self) -> BusStats {
        self.state.borrow().stats
    }

    /// Let `transfers` more reads or writes through, then make the next one
    /// move zero bytes. Later transfers succeed again.
    pub fn fail_transfer_after(&self, transfers: u32) {
        self.state.borrow_mut().fail_after = Some(transfers);
    }

    /// Make the next `count` opens fail.
    pub fn fail_opens(&self, count: u32) {
        self.state.borrow_mut().failing_opens = count;
    }
}

impl BusProvider for SimulatedBus {
    type Channel = SimChannel;

    fn open(&mut self, channel: u8) -> Result<SimChannel, TransportError> {
        let mut state = self.state.borrow_mut();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(TransportError::NotFound { channel });
        }
        state.stats.opens += 1;
        Ok(SimChannel {
            state: Rc::clone(&self.state),
            address: None,
        })
    }
}

/// Channel handed out by [`SimulatedBus`].
#[derive(Debug)]
pub struct SimChannel {
    state: Rc<RefCell<SimState>>,
    address: Option<u16>,
}

impl I2cChannel for SimChannel {
    type Error = SimError;

    fn set_slave_address(&mut self, address: u16) -> Result<(), SimError> {
        let mut state = self.state.borrow_mut();
        state.stats.address_calls += 1;
        state.events.push(BusEvent::Address(address));
        if address > MAX_ADDRESS {
            self.address = None;
            return Err(SimError::InvalidAddress(address));
        }
        self.address = Some(address);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SimError> {
        let mut state = self.state.borrow_mut();
        let Some(address) = self.address else {
            return Ok(0);
        };
        state.stats.writes += 1;
        state.events.push(BusEvent::Write {
            address,
            bytes: bytes.to_vec(),
        });
        if state.take_fault() {
            return Ok(0);
        }
        match state.devices.get_mut(&address) {
            Some(device) => {
                device.write(bytes);
                Ok(bytes.len())
            }
            None => Ok(0),
        }
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SimError> {
        let mut state = self.state.borrow_mut();
        let Some(address) = self.address else {
            return Ok(0);
        };
        state.stats.reads += 1;
        state.events.push(BusEvent::Read {
            address,
            len: buffer.len(),
        });
        if state.take_fault() {
            return Ok(0);
        }
        match state.devices.get_mut(&address) {
            Some(device) => {
                device.read(buffer);
                Ok(buffer.len())
            }
            None => Ok(0),
        }
    }
}
