//! RF-related registers
//!
//! This module contains registers related to RF operation including:
//! - Power amplifier selection and output power
//! - Over-current protection
//! - High-power (+20 dBm) test registers
//! - RSSI sampling
//! - Temperature sensor
//!
//! # High Power Modules
//! RFM69HW/HCW modules route the antenna through PA1 and PA2 only. Those
//! parts need PA0 off, OCP disabled and the TestPa registers switched to
//! their boost values while transmitting (and back while receiving).

use core::convert::Infallible;

use bitflags::bitflags;
use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// Highest value of the 5-bit output power field.
pub const MAX_OUTPUT_POWER: u8 = 0x1F;

bitflags! {
    /// Power amplifier selection bits of PALEVEL
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PaSelect: u8 {
        /// PA0 on RFIO, low-power modules only
        const PA0 = 0x80;
        /// PA1 on PA_BOOST
        const PA1 = 0x40;
        /// PA2 on PA_BOOST
        const PA2 = 0x20;
    }
}

/// PA level register (address: 0x11)
///
/// Selects the power amplifiers and sets the output power.
///
/// # Output Power
/// - PA0 only: Pout = -18 + output_power dBm
/// - PA1 + PA2: Pout = -14 + output_power dBm
/// - PA1 + PA2 with boost test registers: Pout = -11 + output_power dBm
#[register(0x11u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct PaLevel {
    /// Enabled power amplifiers (bits 7:5)
    pub amplifiers: PaSelect,
    /// Output power (bits 4:0), 0..=31
    pub output_power: u8,
}

/// Over-current protection register (address: 0x13)
///
/// Current limit = 45 + 5 * trim mA when enabled.
///
/// # Important Notes
/// - Must be disabled on high power modules while using PA1 + PA2 boost
#[register(0x13u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct Ocp {
    /// Protection enabled
    pub enabled: bool,
    /// Current trim (bits 3:0)
    pub trim: u8,
}

impl Ocp {
    /// OCP on at 95 mA
    pub const ON: Self = Self {
        enabled: true,
        trim: 0x0A,
    };
    /// OCP off (reset trim left at its maximum)
    pub const OFF: Self = Self {
        enabled: false,
        trim: 0x0F,
    };
}

/// High power test register 1 (address: 0x5A)
#[register(0x5Au8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct TestPa1 {
    /// Raw register value
    pub value: u8,
}

impl TestPa1 {
    /// Normal mode and receive
    pub const NORMAL: Self = Self { value: 0x55 };
    /// +20 dBm transmit
    pub const BOOST: Self = Self { value: 0x5D };
}

/// High power test register 2 (address: 0x5C)
#[register(0x5Cu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct TestPa2 {
    /// Raw register value
    pub value: u8,
}

impl TestPa2 {
    /// Normal mode and receive
    pub const NORMAL: Self = Self { value: 0x70 };
    /// +20 dBm transmit
    pub const BOOST: Self = Self { value: 0x7C };
}

/// RSSI value register (address: 0x24)
///
/// Holds the last RSSI measurement. The value decays quickly once
/// PayloadReady is asserted, so sample it right after reading the FIFO.
#[register(0x24u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct RssiValue {
    /// Raw RSSI magnitude
    pub value: u8,
}

bitflags! {
    /// TEMP1 control bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Temp1Bits: u8 {
        /// Trigger a measurement (write only)
        const MEAS_START = 0x08;
        /// Measurement in progress
        const MEAS_RUNNING = 0x04;
    }
}

/// Temperature control register (address: 0x4E)
///
/// # Important Notes
/// - Measurement is only possible in Standby or FS mode
/// - Takes under 100 µs
#[register(0x4Eu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct Temp1 {
    /// Control bits
    pub flags: Temp1Bits,
}

/// Temperature value register (address: 0x4F)
///
/// Raw reading, slope of roughly -1 °C per LSB and uncalibrated offset.
#[register(0x4Fu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct Temp2 {
    /// Raw reading
    pub raw: u8,
}

impl FromByteArray for PaLevel {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            amplifiers: PaSelect::from_bits_truncate(bytes[0]),
            output_power: bytes[0] & MAX_OUTPUT_POWER,
        })
    }
}

impl ToByteArray for PaLevel {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.amplifiers.bits() | (self.output_power & MAX_OUTPUT_POWER)])
    }
}

impl FromByteArray for Ocp {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            enabled: bytes[0] & 0x10 != 0,
            trim: bytes[0] & 0x0F,
        })
    }
}

impl ToByteArray for Ocp {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let enabled = if self.enabled { 0x10 } else { 0x00 };
        Ok([enabled | (self.trim & 0x0F)])
    }
}

impl FromByteArray for TestPa1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for TestPa1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}

impl FromByteArray for TestPa2 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl ToByteArray for TestPa2 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.value])
    }
}

impl FromByteArray for RssiValue {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { value: bytes[0] })
    }
}

impl FromByteArray for Temp1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            flags: Temp1Bits::from_bits_truncate(bytes[0]),
        })
    }
}

impl ToByteArray for Temp1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.flags.bits()])
    }
}

impl FromByteArray for Temp2 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { raw: bytes[0] })
    }
}
