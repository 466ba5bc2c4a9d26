//! Shared driver
//!
//! [`Radio`] owns the transceiver after bring-up. Every operation takes
//! `&self`, so the interrupt loop ([`Radio::run`]) and any number of sends
//! can be polled side by side on one executor:
//!
//! ```no_run
//! # async fn demo<M, SPI, RESET, IRQ, D, C>(radio: rfm69::Radio<'_, M, SPI, RESET, IRQ, D, C>)
//! # where
//! #     M: embassy_sync::blocking_mutex::raw::RawMutex,
//! #     SPI: embedded_hal_async::spi::SpiDevice,
//! #     RESET: embedded_hal::digital::OutputPin,
//! #     IRQ: embedded_hal_async::digital::Wait,
//! #     D: embedded_hal_async::delay::DelayNs + Clone,
//! #     C: rfm69::Clock,
//! # {
//! use embassy_futures::select::select;
//! use rfm69::SendOptions;
//!
//! let sending = async {
//!     radio.send(2, b"hi", SendOptions::default()).await
//! };
//! select(radio.run(), sending).await;
//! # }
//! ```
//!
//! The bus and the cached mode live behind one async mutex that is held for
//! the whole of every multi-transaction sequence. The peer table and the
//! callback list are only touched in short blocking critical sections.

use core::cell::RefCell;
use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiDevice;

use crate::chip::Chip;
use crate::config::RadioConfig;
use crate::mode::Mode;
use crate::packet::Packet;
use crate::peer::{Peer, PeerTable};
use crate::registers::IrqFlags2Bits;
use crate::Error;

mod ancillary;
mod bringup;
mod receive;
mod send;


pub use bringup::Stage;
pub use send::SendOptions;

/// Most receive callbacks that can be registered.
pub const MAX_CALLBACKS: usize = 8;

/// Receive callback, called once per delivered packet.
pub type Callback<'a> = &'a dyn Fn(&Packet);

/// Millisecond time source used to stamp packets.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Hardware handed back by [`Radio::shutdown`].
pub struct Parts<SPI, RESET, IRQ> {
    /// SPI device
    pub spi: SPI,
    /// Reset pin
    pub reset: RESET,
    /// DIO0 interrupt pin
    pub irq: IRQ,
}

/// RFM69 driver with addressing, acknowledgement and retry.
///
/// Built by [`Radio::initialize`], torn down by [`Radio::shutdown`].
pub struct Radio<'a, M, SPI, RESET, IRQ, D, C>
where
    M: RawMutex,
{
    chip: Mutex<M, Chip<SPI>>,
    irq: Mutex<M, IRQ>,
    reset: RESET,
    peers: BlockingMutex<M, RefCell<PeerTable>>,
    callbacks: BlockingMutex<M, RefCell<heapless::Vec<Callback<'a>, MAX_CALLBACKS>>>,
    delay: D,
    clock: C,
    config: RadioConfig,
}

impl<'a, M, SPI, RESET, IRQ, D, C> Radio<'a, M, SPI, RESET, IRQ, D, C>
where
    M: RawMutex,
{
    /// Settings the radio was brought up with.
    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// This node's address.
    pub fn address(&self) -> u8 {
        self.config.address
    }

    /// Copy of the record for `address`, if that node was ever sent to or
    /// heard from.
    pub fn peer(&self, address: u8) -> Option<Peer> {
        self.peers
            .lock(|peers| peers.borrow().get(address).cloned())
    }

    /// Adds a callback for received data packets.
    ///
    /// Callbacks run in registration order, after the chip is back in
    /// receive mode.
    pub fn register_callback(&self, callback: Callback<'a>) -> Result<(), Error> {
        self.callbacks.lock(|callbacks| {
            callbacks
                .borrow_mut()
                .push(callback)
                .map_err(|_| Error::CallbackTableFull)
        })
    }

    /// Releases the hardware.
    pub fn shutdown(self) -> Parts<SPI, RESET, IRQ> {
        info!("shutting down");
        Parts {
            spi: self.chip.into_inner().release().release(),
            reset: self.reset,
            irq: self.irq.into_inner(),
        }
    }

    fn deliver(&self, packet: &Packet) {
        // Copy the list out so a callback may register another one
        let callbacks = self.callbacks.lock(|callbacks| callbacks.borrow().clone());
        for callback in callbacks.iter() {
            callback(packet);
        }
    }
}

impl<'a, M, SPI, RESET, IRQ, D, C> Radio<'a, M, SPI, RESET, IRQ, D, C>
where
    M: RawMutex,
    SPI: SpiDevice,
    RESET: OutputPin,
    IRQ: Wait,
    D: DelayNs + Clone,
    C: Clock,
{
    /// Current operating mode.
    pub async fn mode(&self) -> Mode {
        self.chip.lock().await.mode()
    }

    /// Interrupt loop.
    ///
    /// Waits for rising edges on DIO0 and services each one. Bus errors are
    /// logged and the loop carries on; only a failing interrupt pin ends it.
    pub async fn run(&self) -> Result<Infallible, Error> {
        let mut irq = self.irq.lock().await;
        loop {
            irq.wait_for_rising_edge().await.map_err(|_| Error::Pin)?;
            if let Err(err) = self.service_interrupt().await {
                warn!("interrupt service failed: {:?}", err);
            }
        }
    }

    /// Handles one DIO0 interrupt.
    ///
    /// A finished transmission returns the chip to receive mode. A received
    /// payload runs the receive pipeline and, if it yields a data packet,
    /// hands it to every callback before returning it.
    pub async fn service_interrupt(&self) -> Result<Option<Packet>, Error> {
        let received = {
            let mut chip = self.chip.lock().await;
            let flags = chip.irq_flags().await?;

            if flags.contains(IrqFlags2Bits::PACKET_SENT) {
                trace!("packet sent");
                chip.set_mode(Mode::Receive).await?;
                None
            } else if flags.contains(IrqFlags2Bits::PAYLOAD_READY) {
                chip.set_mode(Mode::Standby).await?;
                let outcome = self.receive(&mut chip).await;
                chip.set_mode(Mode::Receive).await?;
                outcome?
            } else {
                trace!("spurious interrupt, flags {}", flags.bits());
                None
            }
        };

        if let Some(packet) = &received {
            self.deliver(packet);
        }
        Ok(received)
    }
}
