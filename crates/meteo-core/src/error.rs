//! Error taxonomy for the bus, device and supervisor layers.
//!
//! Only [`TransportError`] and [`DeviceError`] unwind the sampling loop.
//! Per-channel compensation problems are plain data, see
//! [`ChannelFault`](crate::sensors::bme280::ChannelFault).

use thiserror_no_std::Error;

/// Direction of a raw bus transfer, used when reporting short transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Write => f.write_str("writing"),
            Self::Read => f.write_str("reading"),
        }
    }
}

/// Failures of the physical bus channel.
///
/// Every variant is fatal to the current bus session: the supervisor backs
/// off and re-opens the whole pipeline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("bus channel {channel} could not be opened (does the device exist? insufficient privilege?)")]
    NotFound { channel: u8 },
    #[error("setting device address {address:#04x} failed")]
    AddressingFailed { address: u16 },
    #[error("{direction} {requested} bytes to device {address:#04x} failed ({transferred} transferred)")]
    ShortTransfer {
        address: u16,
        direction: Direction,
        requested: usize,
        transferred: usize,
    },
    #[error("raw transfer attempted before any device was addressed")]
    NotAddressed,
    #[error("bus channel is closed")]
    Closed,
}

/// Failures raised while bringing up or reading a device.
///
/// All of them are treated the same way as a [`TransportError`] by the
/// supervisor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("transport error: {0}")]
    Transport(TransportError),
    #[error("device {address:#04x} still calibrating after {attempts} status polls")]
    CalibrationTimeout { address: u16, attempts: u32 },
    #[error("device {address:#04x} measurement not finished after {attempts} status polls")]
    MeasurementTimeout { address: u16, attempts: u32 },
    #[error("invalid auxiliary channel config: input {input}, full-scale mode {full_scale}")]
    InvalidAuxConfig { input: u8, full_scale: u8 },
}

impl From<TransportError> for DeviceError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl DeviceError {
    /// The underlying transport error, if this failure came from the bus.
    pub fn transport(&self) -> Option<TransportError> {
        match self {
            Self::Transport(e) => Some(*e),
            _ => None,
        }
    }
}
