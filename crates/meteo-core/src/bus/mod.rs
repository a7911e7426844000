//! Shared addressed bus transport.
//!
//! [`I2cBus`] owns the open channel and remembers which device was addressed
//! last. Devices never own the bus: every register operation borrows it for
//! the duration of a single transaction, so two devices can never interleave
//! their transfers on the same channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut bus = I2cBus::open(&mut provider, 1)?;
//! bus.address(0x76)?;
//! bus.write(&[0xD0])?;
//! let mut id = [0u8; 1];
//! bus.read(&mut id)?;
//! ```

pub mod register;

pub use register::RegisterDevice;

use log::{debug, trace};

use crate::error::{Direction, TransportError};

/// Raw byte channel underneath an [`I2cBus`].
///
/// Implementations report how many bytes were actually moved; the bus turns
/// any mismatch into a [`TransportError::ShortTransfer`].
pub trait I2cChannel {
    type Error: core::fmt::Debug;

    /// Select the peripheral that subsequent reads and writes talk to.
    fn set_slave_address(&mut self, address: u16) -> Result<(), Self::Error>;

    /// Write `bytes` as one bus transaction.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Read up to `buffer.len()` bytes as one bus transaction.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Opens bus channels by number.
///
/// The supervisor keeps the provider around so it can re-open the channel
/// from scratch after a fault.
pub trait BusProvider {
    type Channel: I2cChannel;

    fn open(&mut self, channel: u8) -> Result<Self::Channel, TransportError>;
}

/// An open bus channel plus the last-addressed device.
pub struct I2cBus<C> {
    channel: Option<C>,
    id: u8,
    last_address: Option<u16>,
}

impl<C: I2cChannel> I2cBus<C> {
    /// Open bus `id` through `provider`.
    pub fn open<P>(provider: &mut P, id: u8) -> Result<Self, TransportError>
    where
        P: BusProvider<Channel = C>,
    {
        let channel = provider.open(id)?;
        debug!("Opened bus channel {}", id);
        Ok(Self::from_channel(id, channel))
    }

    /// Wrap an already opened channel.
    pub const fn from_channel(id: u8, channel: C) -> Self {
        Self {
            channel: Some(channel),
            id,
            last_address: None,
        }
    }

    pub const fn id(&self) -> u8 {
        self.id
    }

    pub const fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// The device the next raw transfer goes to, if any.
    pub const fn current_address(&self) -> Option<u16> {
        self.last_address
    }

    /// Make `address` the target of subsequent transfers.
    ///
    /// Repeating the current address skips the control operation. The
    /// channel keeps its target between transfers, so the skipped call would
    /// not change anything observable.
    pub fn address(&mut self, address: u16) -> Result<(), TransportError> {
        let channel = self.channel.as_mut().ok_or(TransportError::Closed)?;

        if self.last_address == Some(address) {
            return Ok(());
        }

        // Forget the old target first: after a failed switch the channel's
        // real target is unknown.
        self.last_address = None;
        channel.set_slave_address(address).map_err(|e| {
            debug!("Setting address {:#04x} failed: {:?}", address, e);
            TransportError::AddressingFailed { address }
        })?;
        self.last_address = Some(address);
        Ok(())
    }

    /// Write all of `bytes` to the addressed device in one transfer.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let (channel, address) = self.active()?;
        let transferred = channel.write(bytes).unwrap_or_else(|e| {
            debug!("Write to {:#04x} failed: {:?}", address, e);
            0
        });
        trace!("write {:#04x} {:02x?} -> {}", address, bytes, transferred);
        check_transfer(address, Direction::Write, bytes.len(), transferred)
    }

    /// Fill `buffer` from the addressed device in one transfer.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<(), TransportError> {
        let (channel, address) = self.active()?;
        let transferred = channel.read(buffer).unwrap_or_else(|e| {
            debug!("Read from {:#04x} failed: {:?}", address, e);
            0
        });
        trace!("read {:#04x} -> {:02x?} ({})", address, buffer, transferred);
        check_transfer(address, Direction::Read, buffer.len(), transferred)
    }

    /// Release the channel. Every later call fails with
    /// [`TransportError::Closed`].
    pub fn close(&mut self) {
        if self.channel.take().is_some() {
            debug!("Closed bus channel {}", self.id);
        }
        self.last_address = None;
    }

    fn active(&mut self) -> Result<(&mut C, u16), TransportError> {
        let channel = self.channel.as_mut().ok_or(TransportError::Closed)?;
        let address = self.last_address.ok_or(TransportError::NotAddressed)?;
        Ok((channel, address))
    }
}

fn check_transfer(
    address: u16,
    direction: Direction,
    requested: usize,
    transferred: usize,
) -> Result<(), TransportError> {
    if transferred == requested {
        Ok(())
    } else {
        Err(TransportError::ShortTransfer {
            address,
            direction,
            requested,
            transferred,
        })
    }
}
