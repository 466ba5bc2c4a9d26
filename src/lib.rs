#![cfg_attr(not(test), no_std)]
//! RFM69 Radio Driver
//!
//! This crate drives the HopeRF RFM69 family (Semtech SX1231 register map)
//! half-duplex FSK transceivers over SPI, and layers a small reliable
//! delivery protocol on top: node addressing, acknowledgements and bounded
//! retries.
//!
//! # Features
//! - Bands: 315, 433, 868 and 915 MHz
//! - Packet mode FSK at 55.5 kbps, variable length frames with CRC
//! - Up to 66 payload bytes per frame
//! - Optional AES-128 done by the chip
//! - RFM69HW/HCW high power (PA_BOOST) support
//! - Acknowledged sends with retry, broadcast, promiscuous receive
//! - Temperature sensor, RC calibration, RSSI
//!
//! # Architecture
//! The driver is organized into several modules:
//!
//! - [`device`]: Register bus over an async SPI device
//! - [`registers`]: Typed register definitions
//! - [`mode`]: Operating mode state machine
//! - [`config`]: Bring-up settings and the baseline register table
//! - [`frame`]: Over-the-air frame format
//! - [`packet`]: Sent and received packets
//! - [`peer`]: Per-address send/receive bookkeeping
//! - [`radio`]: The shared driver: bring-up, send, receive, interrupts
//!
//! # Usage
//! [`Radio::initialize`] takes the SPI device, the reset and DIO0 pins, a
//! delay, a clock and a [`RadioConfig`], and returns a driver in receive
//! mode. Poll [`Radio::run`] for as long as the radio is in use; sends and
//! the other operations can run concurrently with it since they all take
//! `&self`.
//!
//! # Important Notes
//! - Only DIO0 is used. It must be wired to a pin that implements
//!   `embedded_hal_async::digital::Wait`
//! - At most one send per destination can be in flight
//! - Received packets are handed to callbacks after the chip is back in
//!   receive mode
//!
//! # Example
//! ```no_run
//! use embassy_futures::select::{select, Either};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use embedded_hal::digital::OutputPin;
//! use embedded_hal_async::{delay::DelayNs, digital::Wait, spi::SpiDevice};
//! use rfm69::{Clock, Error, Packet, Radio, RadioConfig, SendOptions};
//!
//! async fn ping<SPI, RESET, IRQ, D, C>(
//!     spi: SPI,
//!     reset: RESET,
//!     irq: IRQ,
//!     delay: D,
//!     clock: C,
//! ) -> Result<Packet, Error>
//! where
//!     SPI: SpiDevice,
//!     RESET: OutputPin,
//!     IRQ: Wait,
//!     D: DelayNs + Clone,
//!     C: Clock,
//! {
//!     let config = RadioConfig {
//!         address: 1,
//!         ..RadioConfig::default()
//!     };
//!     let radio: Radio<'_, NoopRawMutex, _, _, _, _, _> =
//!         Radio::initialize(spi, reset, irq, delay, clock, config).await?;
//!
//!     let outcome = select(radio.run(), radio.send(2, b"ping", SendOptions::default())).await;
//!     match outcome {
//!         Either::First(Err(err)) => Err(err),
//!         Either::First(Ok(never)) => match never {},
//!         Either::Second(sent) => sent,
//!     }
//! }
//! ```

pub(crate) mod fmt;

pub mod chip;
pub mod config;
pub mod device;
mod error;
pub mod frame;
pub mod mode;
pub mod packet;
pub mod peer;
pub mod radio;
pub mod registers;

#[cfg(test)]
mod sim;

pub use chip::Chip;
pub use config::{FrequencyBand, RadioConfig};
pub use device::Device;
pub use error::Error;
pub use mode::Mode;
pub use packet::Packet;
pub use peer::{Peer, PeerTable};
pub use radio::{Callback, Clock, Parts, Radio, SendOptions, Stage};
