//! RFM69 Register Bus Interface
//!
//! This module provides the register-level interface to the RFM69 over SPI.
//! Every operation is a single SPI transaction: one address byte followed by
//! the data bytes. Bit 7 of the address byte selects the direction:
//! - set: write
//! - clear: read
//!
//! Typed access goes through the `regiface` register types defined in
//! [`registers`](crate::registers). Raw access exists for the baseline
//! configuration table and for burst transfers to the FIFO and AES key.
//!
//! # Example
//! ```no_run
//! # async fn demo<SPI: embedded_hal_async::spi::SpiDevice>(spi: SPI) -> Result<(), regiface::errors::Error> {
//! use rfm69::{Device, registers::IrqFlags2};
//!
//! let mut device = Device::new(spi);
//! let flags: IrqFlags2 = device.read_register().await?;
//! device.write_raw(0x2F, 0xAA).await?;
//! # Ok(())
//! # }
//! ```

use core::convert::Infallible;

use embedded_hal_async::spi::{Operation, SpiDevice};
use regiface::{errors::Error as RegifaceError, ByteArray, ReadableRegister, WritableRegister};

/// Address bit that marks a write access.
const WRITE_FLAG: u8 = 0x80;

/// Register bus of a single RFM69.
///
/// Wraps an SPI device. The bus is not reentrant; callers serialize access
/// (the [`Radio`](crate::Radio) keeps it behind a mutex).
pub struct Device<SPI> {
    spi: SPI,
}

impl<SPI> Device<SPI> {
    /// Creates a new Device wrapping the provided SPI device.
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Releases the underlying SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI> Device<SPI>
where
    SPI: SpiDevice,
{
    /// Reads a typed register.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    /// * `RegifaceError::DeserializationError` - Failed to parse register value
    pub async fn read_register<R>(&mut self) -> Result<R, RegifaceError>
    where
        R: ReadableRegister<IdType = u8>,
    {
        let mut raw_value = R::Array::new();
        self.read_burst(R::id(), raw_value.as_mut()).await?;

        R::from_bytes(raw_value).map_err(|_| RegifaceError::DeserializationError)
    }

    /// Writes a typed register.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    pub async fn write_register<R>(&mut self, register: R) -> Result<(), RegifaceError>
    where
        R: WritableRegister<IdType = u8, Error = Infallible>,
    {
        let raw_value = match register.to_bytes() {
            Ok(raw) => raw,
            Err(never) => match never {},
        };

        self.write_burst(R::id(), raw_value.as_ref()).await
    }

    /// Writes a single register by address.
    pub async fn write_raw(&mut self, address: u8, value: u8) -> Result<(), RegifaceError> {
        self.write_burst(address, &[value]).await
    }

    /// Writes `bytes` starting at `address`.
    ///
    /// The FIFO (0x00) does not auto-increment, so a burst to it queues every
    /// byte. Other addresses auto-increment on the chip side.
    pub async fn write_burst(&mut self, address: u8, bytes: &[u8]) -> Result<(), RegifaceError> {
        let header = [address | WRITE_FLAG];

        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Write(bytes)])
            .await
            .map_err(|_| RegifaceError::BusError)
    }

    /// Reads `bytes.len()` bytes starting at `address`.
    pub async fn read_burst(&mut self, address: u8, bytes: &mut [u8]) -> Result<(), RegifaceError> {
        let header = [address & !WRITE_FLAG];

        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(bytes)])
            .await
            .map_err(|_| RegifaceError::BusError)
    }
}
