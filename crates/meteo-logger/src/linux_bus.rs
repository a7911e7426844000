//! `/dev/i2c-N` access through rppal.

use log::error;
use meteo_core::bus::{BusProvider, I2cChannel};
use meteo_core::error::TransportError;
use rppal::i2c::{self, I2c};

/// Opens `/dev/i2c-N` character devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct RppalProvider;

impl BusProvider for RppalProvider {
    type Channel = RppalChannel;

    fn open(&mut self, channel: u8) -> Result<RppalChannel, TransportError> {
        I2c::with_bus(channel).map(RppalChannel).map_err(|e| {
            error!("Opening /dev/i2c-{} failed: {}", channel, e);
            TransportError::NotFound { channel }
        })
    }
}

/// An open bus. The device is closed when this is dropped.
#[derive(Debug)]
pub struct RppalChannel(I2c);

impl I2cChannel for RppalChannel {
    type Error = i2c::Error;

    fn set_slave_address(&mut self, address: u16) -> Result<(), i2c::Error> {
        self.0.set_slave_address(address)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, i2c::Error> {
        self.0.write(bytes)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, i2c::Error> {
        self.0.read(buffer)
    }
}
