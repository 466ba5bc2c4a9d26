//! Acknowledged delivery

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiDevice;

use super::{Clock, Radio};
use crate::frame::{self, Control, BROADCAST};
use crate::packet::Packet;
use crate::peer::PeerTable;
use crate::Error;

const ACK_POLL_MS: u32 = 10;

/// Per-send settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SendOptions {
    /// Transmissions before giving up, at least 1. More than one implies
    /// `require_ack`.
    pub attempts: u8,
    /// Pause between an unacknowledged attempt and the next one
    pub attempt_wait_ms: u32,
    /// Wait for an acknowledgement
    pub require_ack: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_wait_ms: 100,
            require_ack: true,
        }
    }
}

impl SendOptions {
    /// Single transmission without acknowledgement.
    pub const fn fire_and_forget() -> Self {
        Self {
            attempts: 1,
            attempt_wait_ms: 0,
            require_ack: false,
        }
    }
}

/// Clears a peer's `sending` flag when dropped.
struct SendGuard<'p, M: RawMutex> {
    peers: &'p BlockingMutex<M, RefCell<PeerTable>>,
    address: u8,
}

impl<M: RawMutex> Drop for SendGuard<'_, M> {
    fn drop(&mut self) {
        self.peers
            .lock(|peers| peers.borrow_mut().finish_send(self.address));
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
    /// Sends `payload` to `to`, retrying until it is acknowledged.
    ///
    /// Payloads longer than 66 bytes are truncated. Returns the sent packet
    /// with its attempt count and acknowledgement time filled in.
    ///
    /// # Errors
    /// * [`Error::AlreadySending`] - a send to `to` is still running; nothing
    ///   was transmitted
    /// * [`Error::NoAck`] - every attempt went unacknowledged
    /// * [`Error::Bus`] - SPI communication failed
    pub async fn send(&self, to: u8, payload: &[u8], options: SendOptions) -> Result<Packet, Error> {
        let attempts = options.attempts.max(1);
        let require_ack = options.require_ack || attempts > 1;

        let packet = Packet::outgoing(
            to,
            self.config.address,
            payload,
            require_ack,
            self.clock.now_ms(),
        );
        self.peers
            .lock(|peers| peers.borrow_mut().begin_send(packet.clone()))?;
        let _guard = SendGuard {
            peers: &self.peers,
            address: to,
        };

        let control = if require_ack {
            Control::ACK_REQUESTED
        } else {
            Control::empty()
        };
        let frame = frame::encode(to, self.config.address, control, payload);
        if self.config.verbose {
            debug!("tx {:?}", frame.as_slice());
        }

        let mut delay = self.delay.clone();
        for attempt in 1..=attempts {
            trace!("send to {} attempt {} of {}", to, attempt, attempts);
            self.chip.lock().await.transmit(&frame, &mut delay).await?;

            if !require_ack {
                return Ok(self.finish(&packet, attempt));
            }
            if self.wait_for_ack(to, &mut delay).await {
                let sent = self.finish(&packet, attempt);
                debug!(
                    "ack from {} after {} attempts, {} ms",
                    to,
                    attempt,
                    sent.ack_latency_ms().unwrap_or(0)
                );
                return Ok(sent);
            }
            if attempt < attempts {
                delay.delay_ms(options.attempt_wait_ms).await;
            }
        }

        warn!("no ack from {} after {} attempts", to, attempts);
        Err(Error::NoAck {
            address: to,
            attempts,
        })
    }

    /// Sends `payload` once to every node, without acknowledgement.
    pub async fn broadcast(&self, payload: &[u8]) -> Result<Packet, Error> {
        self.send(BROADCAST, payload, SendOptions::fire_and_forget())
            .await
    }

    async fn wait_for_ack(&self, address: u8, delay: &mut D) -> bool {
        let mut waited = 0;
        loop {
            if self.peers.lock(|peers| peers.borrow().is_acked(address)) {
                return true;
            }
            if waited >= self.config.ack_timeout_ms {
                return false;
            }
            delay.delay_ms(ACK_POLL_MS).await;
            waited += ACK_POLL_MS;
        }
    }

    fn finish(&self, packet: &Packet, attempts: u8) -> Packet {
        self.peers
            .lock(|peers| peers.borrow_mut().record_attempts(packet.target, attempts))
            .unwrap_or_else(|| Packet {
                attempts,
                ..packet.clone()
            })
    }
}
