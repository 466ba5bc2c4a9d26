//! Driver error type

use regiface::errors::Error as RegifaceError;

/// Errors reported by the driver.
///
/// Bring-up failures ([`Error::HandshakeTimeout`], [`Error::ModeReadyTimeout`])
/// are fatal for [`Radio::initialize`](crate::Radio::initialize). Everything
/// else fails only the operation that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// SPI transfer failed
    Bus,
    /// A register value could not be converted to or from its typed form
    Register,
    /// Reset or interrupt pin failed
    Pin,
    /// The chip never echoed the handshake value back
    HandshakeTimeout {
        /// Value written to the handshake register
        probe: u8,
    },
    /// IRQFLAGS1.ModeReady never came up during bring-up
    ModeReadyTimeout,
    /// A send to this address is already in flight
    AlreadySending {
        /// Destination address
        address: u8,
    },
    /// Every attempt went unacknowledged
    NoAck {
        /// Destination address
        address: u8,
        /// Number of transmissions made
        attempts: u8,
    },
    /// Temperature measurement did not finish in time
    TemperatureTimeout,
    /// RC oscillator calibration did not finish in time
    CalibrationTimeout,
    /// No room left for another receive callback
    CallbackTableFull,
    /// Every peer record has a send in flight
    PeerTableFull,
}

impl From<RegifaceError> for Error {
    fn from(err: RegifaceError) -> Self {
        match err {
            RegifaceError::BusError => Error::Bus,
            _ => Error::Register,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Bus => f.write_str("SPI bus error"),
            Error::Register => f.write_str("invalid register value"),
            Error::Pin => f.write_str("GPIO error"),
            Error::HandshakeTimeout { probe } => {
                write!(f, "handshake value {probe:#04x} was never echoed back")
            }
            Error::ModeReadyTimeout => f.write_str("chip never reported mode ready"),
            Error::AlreadySending { address } => {
                write!(f, "already sending to address {address}")
            }
            Error::NoAck { address, attempts } => write!(
                f,
                "no acknowledgement from address {address} after {attempts} attempts"
            ),
            Error::TemperatureTimeout => f.write_str("temperature measurement timed out"),
            Error::CalibrationTimeout => f.write_str("RC calibration timed out"),
            Error::CallbackTableFull => f.write_str("receive callback table is full"),
            Error::PeerTableFull => f.write_str("every peer has a send in flight"),
        }
    }
}
