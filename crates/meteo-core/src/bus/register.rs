//! Register-oriented access to one device on a shared [`I2cBus`].
//!
//! Every read follows the same transaction shape: address the device, write
//! the one-byte register selector, then read the payload. Writes send the
//! register and its data contiguously in a single transfer.

use super::{I2cBus, I2cChannel};
use crate::error::TransportError;

/// Handle for one addressed peripheral.
///
/// Holds nothing but the address; the bus is lent in for each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDevice {
    address: u16,
}

impl RegisterDevice {
    pub const fn new(address: u16) -> Self {
        Self { address }
    }

    pub const fn address(&self) -> u16 {
        self.address
    }

    /// Read `N` bytes starting at `register`.
    pub fn read_bytes<C: I2cChannel, const N: usize>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<[u8; N], TransportError> {
        bus.address(self.address)?;
        bus.write(&[register])?;
        let mut buffer = [0u8; N];
        bus.read(&mut buffer)?;
        Ok(buffer)
    }

    /// Read `N` bytes without sending a register selector first.
    ///
    /// For devices whose register pointer is already set.
    pub fn read_raw<C: I2cChannel, const N: usize>(
        &self,
        bus: &mut I2cBus<C>,
    ) -> Result<[u8; N], TransportError> {
        bus.address(self.address)?;
        let mut buffer = [0u8; N];
        bus.read(&mut buffer)?;
        Ok(buffer)
    }

    pub fn read_u8<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<u8, TransportError> {
        let [value] = self.read_bytes::<C, 1>(bus, register)?;
        Ok(value)
    }

    pub fn read_s8<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<i8, TransportError> {
        Ok(self.read_u8(bus, register)? as i8)
    }

    pub fn read_u16_be<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<u16, TransportError> {
        Ok(u16::from_be_bytes(self.read_bytes(bus, register)?))
    }

    pub fn read_s16_be<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<i16, TransportError> {
        Ok(self.read_u16_be(bus, register)? as i16)
    }

    /// Little-endian register pair, read big-endian and byte-swapped.
    pub fn read_u16_le<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<u16, TransportError> {
        Ok(self.read_u16_be(bus, register)?.swap_bytes())
    }

    pub fn read_s16_le<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<i16, TransportError> {
        Ok(self.read_u16_le(bus, register)? as i16)
    }

    /// Three-byte big-endian value in the low 24 bits of the result.
    pub fn read_u24_be<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
    ) -> Result<u32, TransportError> {
        let [msb, lsb, xlsb] = self.read_bytes::<C, 3>(bus, register)?;
        Ok(u32::from_be_bytes([0, msb, lsb, xlsb]))
    }

    /// Write `value` into `register` as a single `[register, value]` transfer.
    pub fn write_u8<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        register: u8,
        value: u8,
    ) -> Result<(), TransportError> {
        self.write_bytes(bus, &[register, value])
    }

    /// Send `bytes` to the device as one transfer.
    pub fn write_bytes<C: I2cChannel>(
        &self,
        bus: &mut I2cBus<C>,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        bus.address(self.address)?;
        bus.write(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Direction;
    use crate::sim::{BusEvent, SimChannel, SimulatedBus};

    const ADDRESS: u16 = 0x40;

    fn setup(registers: &[(u8, u8)]) -> (SimulatedBus, I2cBus<SimChannel>) {
        let sim = SimulatedBus::new().with_memory_device(ADDRESS);
        for &(register, value) in registers {
            sim.poke(ADDRESS, register, value);
        }
        let mut provider = sim.clone();
        let bus = I2cBus::open(&mut provider, 1).unwrap();
        (sim, bus)
    }

    #[test]
    fn test_le_is_swapped_be() {
        let pairs = [(0x70u8, 0x6Bu8), (0x43, 0x67), (0x18, 0xFC), (0x00, 0x80), (0xFF, 0xFF)];
        for (hi, lo) in pairs {
            let (_sim, mut bus) = setup(&[(0x88, hi), (0x89, lo)]);
            let device = RegisterDevice::new(ADDRESS);

            let be = device.read_u16_be(&mut bus, 0x88).unwrap();
            let le = device.read_u16_le(&mut bus, 0x88).unwrap();

            assert_eq!(be, u16::from_be_bytes([hi, lo]));
            assert_eq!(le, be.swap_bytes());
        }
    }

    #[test]
    fn test_signed_reads() {
        let (_sim, mut bus) = setup(&[(0x8A, 0x18), (0x8B, 0xFC), (0xE7, 0x9C)]);
        let device = RegisterDevice::new(ADDRESS);

        // 0xFC18 little-endian is -1000
        assert_eq!(device.read_s16_le(&mut bus, 0x8A).unwrap(), -1000);
        assert_eq!(device.read_s16_be(&mut bus, 0x8A).unwrap(), 0x18FC);
        assert_eq!(device.read_s8(&mut bus, 0xE7).unwrap(), -100);
    }

    #[test]
    fn test_read_u24_be() {
        let (_sim, mut bus) = setup(&[(0xFA, 0x7E), (0xFB, 0xED), (0xFC, 0x00)]);
        let device = RegisterDevice::new(ADDRESS);

        assert_eq!(device.read_u24_be(&mut bus, 0xFA).unwrap(), 0x7EED00);
    }

    #[test]
    fn test_read_transaction_shape() {
        let (sim, mut bus) = setup(&[(0xD0, 0x60)]);
        let device = RegisterDevice::new(ADDRESS);

        assert_eq!(device.read_u8(&mut bus, 0xD0).unwrap(), 0x60);
        assert_eq!(
            sim.events(),
            [
                BusEvent::Address(ADDRESS),
                BusEvent::Write {
                    address: ADDRESS,
                    bytes: alloc::vec![0xD0],
                },
                BusEvent::Read {
                    address: ADDRESS,
                    len: 1,
                },
            ]
        );
    }

    #[test]
    fn test_write_u8_is_one_transfer() {
        let (sim, mut bus) = setup(&[]);
        let device = RegisterDevice::new(ADDRESS);

        device.write_u8(&mut bus, 0xF4, 110).unwrap();

        let writes: alloc::vec::Vec<_> = sim
            .events()
            .into_iter()
            .filter(|e| matches!(e, BusEvent::Write { .. }))
            .collect();
        assert_eq!(
            writes,
            [BusEvent::Write {
                address: ADDRESS,
                bytes: alloc::vec![0xF4, 110],
            }]
        );
        assert_eq!(sim.peek(ADDRESS, 0xF4), Some(110));
    }

    #[test]
    fn test_transport_errors_pass_through() {
        let (sim, mut bus) = setup(&[]);
        let device = RegisterDevice::new(ADDRESS);

        // Register selector goes through, payload read comes back short.
        sim.fail_transfer_after(1);
        assert_eq!(
            device.read_u16_be(&mut bus, 0x88),
            Err(TransportError::ShortTransfer {
                address: ADDRESS,
                direction: Direction::Read,
                requested: 2,
                transferred: 0,
            })
        );
    }
}
