//! Operating mode and interrupt registers
//!
//! This module contains the registers that drive the chip's state machine
//! and its interrupt output:
//! - Operating mode selection
//! - DIO0 interrupt mapping
//! - Interrupt status flags
//! - RC oscillator calibration
//!
//! Only DIO0 is used by this driver. Its meaning depends on the current
//! mode: in TX it signals PacketSent, in RX it signals PayloadReady.

use core::convert::Infallible;

use bitflags::bitflags;
use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

use crate::mode::Mode;

/// Bits 4:2 of OPMODE
const MODE_MASK: u8 = 0x1C;

/// Error type for an OPMODE value with no matching mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMode(pub u8);

/// Operating mode register (address: 0x01)
///
/// Selects the transceiver mode and controls the automatic sequencer and
/// listen mode.
///
/// # Important Notes
/// - Changes to the mode bits must keep the sequencer and listen bits intact
/// - The driver always leaves the sequencer on and listen mode off
#[register(0x01u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct OpMode {
    /// Sequencer disabled, modes are forced manually
    pub sequencer_off: bool,
    /// Listen mode enabled
    pub listen_on: bool,
    /// Abort listen mode, only valid together with `listen_on = false`
    pub listen_abort: bool,
    /// Transceiver mode
    pub mode: Mode,
}

impl OpMode {
    /// Returns a copy with the mode bits replaced.
    pub fn with_mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }
}

/// DIO0 function selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dio0Mapping {
    /// Mapping 00: PacketSent while transmitting
    PacketSent = 0x00,
    /// Mapping 01: PayloadReady while receiving
    PayloadReady = 0x40,
}

/// DIO mapping register 1 (address: 0x25)
///
/// Routes internal events to DIO0..DIO3. Only DIO0 is wired, so the other
/// mappings are written as zero.
#[register(0x25u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct DioMapping1 {
    /// DIO0 function
    pub dio0: Dio0Mapping,
}

bitflags! {
    /// IRQFLAGS1 status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags1Bits: u8 {
        /// Requested operating mode is ready
        const MODE_READY = 0x80;
        /// Receiver ready
        const RX_READY = 0x40;
        /// Transmitter ready
        const TX_READY = 0x20;
        /// PLL locked
        const PLL_LOCK = 0x10;
        /// RSSI above threshold
        const RSSI = 0x08;
        /// Receive timeout
        const TIMEOUT = 0x04;
        /// Entered intermediate auto mode
        const AUTO_MODE = 0x02;
        /// Sync word and address matched
        const SYNC_ADDRESS_MATCH = 0x01;
    }
}

/// Interrupt flags register 1 (address: 0x27)
#[register(0x27u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct IrqFlags1 {
    /// Status bits
    pub flags: IrqFlags1Bits,
}

bitflags! {
    /// IRQFLAGS2 status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags2Bits: u8 {
        /// FIFO full
        const FIFO_FULL = 0x80;
        /// FIFO holds at least one byte
        const FIFO_NOT_EMPTY = 0x40;
        /// FIFO level above threshold
        const FIFO_LEVEL = 0x20;
        /// FIFO overrun
        const FIFO_OVERRUN = 0x10;
        /// Packet completely sent, cleared when leaving TX
        const PACKET_SENT = 0x08;
        /// Payload ready in FIFO, cleared once the FIFO is empty
        const PAYLOAD_READY = 0x04;
        /// CRC of the received payload is valid
        const CRC_OK = 0x02;
    }
}

/// Interrupt flags register 2 (address: 0x28)
///
/// The interrupt dispatcher reads this once per DIO0 edge to tell a finished
/// transmission from a received payload.
#[register(0x28u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct IrqFlags2 {
    /// Status bits
    pub flags: IrqFlags2Bits,
}

bitflags! {
    /// OSC1 calibration bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Osc1Bits: u8 {
        /// Start RC oscillator calibration (write only)
        const RC_CAL_START = 0x80;
        /// RC oscillator calibration finished
        const RC_CAL_DONE = 0x40;
    }
}

/// Oscillator register 1 (address: 0x0A)
///
/// Triggers calibration of the internal RC oscillator. Recommended when the
/// device runs across wide temperature swings.
#[register(0x0Au8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct Osc1 {
    /// Calibration bits
    pub flags: Osc1Bits,
}

impl FromByteArray for OpMode {
    type Error = InvalidMode;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        let mode = Mode::from_bits(bytes[0] & MODE_MASK).ok_or(InvalidMode(bytes[0]))?;

        Ok(Self {
            sequencer_off: bytes[0] & 0x80 != 0,
            listen_on: bytes[0] & 0x40 != 0,
            listen_abort: bytes[0] & 0x20 != 0,
            mode,
        })
    }
}

impl ToByteArray for OpMode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let mut value = self.mode.bits();
        if self.sequencer_off {
            value |= 0x80;
        }
        if self.listen_on {
            value |= 0x40;
        }
        if self.listen_abort {
            value |= 0x20;
        }
        Ok([value])
    }
}

impl FromByteArray for DioMapping1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        // Mappings 10 and 11 are never programmed by this driver.
        let dio0 = if bytes[0] & 0xC0 == 0x40 {
            Dio0Mapping::PayloadReady
        } else {
            Dio0Mapping::PacketSent
        };
        Ok(Self { dio0 })
    }
}

impl ToByteArray for DioMapping1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.dio0 as u8])
    }
}

impl FromByteArray for IrqFlags1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            flags: IrqFlags1Bits::from_bits_truncate(bytes[0]),
        })
    }
}

impl FromByteArray for IrqFlags2 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            flags: IrqFlags2Bits::from_bits_truncate(bytes[0]),
        })
    }
}

impl FromByteArray for Osc1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            flags: Osc1Bits::from_bits_truncate(bytes[0]),
        })
    }
}

impl ToByteArray for Osc1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.flags.bits()])
    }
}
