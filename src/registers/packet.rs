//! Packet handling registers
//!
//! This module contains registers related to packet processing:
//! - FIFO access
//! - Sync word (also used as the bring-up handshake register)
//! - AES configuration and key
//!
//! The remaining packet engine registers (PACKETCONFIG1, PAYLOADLENGTH,
//! FIFOTHRESH, ...) are only ever written from the baseline table in
//! [`config`](crate::config) and have no typed form.

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// FIFO access address. Bursts to it do not auto-increment.
pub const FIFO: u8 = 0x00;

/// First of the 16 AES key registers (0x3E..=0x4D).
pub const AES_KEY: u8 = 0x3E;

/// Sync word byte 1 register (address: 0x2F)
///
/// Fixed at 0x2D in operation. Since it is plain read/write storage it also
/// serves as the scratch register for the bring-up handshake.
#[register(0x2Fu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct SyncValue1 {
    /// Sync byte value
    pub value: u8,
}

/// Packet configuration register 2 (address: 0x3D)
///
/// # Important Notes
/// - AES can only be toggled in Standby
/// - `restart_delay` must match the transmitter's PA ramp-down time
#[register(0x3Du8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct PacketConfig2 {
    /// Inter-packet RX restart delay (bits 7:4), 2^n bit periods
    pub restart_delay: u8,
    /// Force a receiver restart (bit 2, write only)
    pub rx_restart: bool,
    /// Restart the receiver automatically after PayloadReady is cleared
    pub auto_rx_restart: bool,
    /// AES encryption/decryption of the payload
    pub aes: bool,
}

impl FromByteArray for SyncValue1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for SyncValue1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}

impl FromByteArray for PacketConfig2 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            restart_delay: bytes[0] >> 4,
            rx_restart: bytes[0] & 0x04 != 0,
            auto_rx_restart: bytes[0] & 0x02 != 0,
            aes: bytes[0] & 0x01 != 0,
        })
    }
}

impl ToByteArray for PacketConfig2 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let mut value = (self.restart_delay & 0x0F) << 4;
        if self.rx_restart {
            value |= 0x04;
        }
        if self.auto_rx_restart {
            value |= 0x02;
        }
        if self.aes {
            value |= 0x01;
        }
        Ok([value])
    }
}
