//! Receive pipeline
//!
//! Runs with the bus locked and the chip in Standby. Reads the header,
//! filters on address, then either records an acknowledgement or reads the
//! payload, answers with an acknowledgement if asked, and stores the packet.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiDevice;

use super::{Clock, Radio};
use crate::chip::Chip;
use crate::frame::{self, Header, BROADCAST, HEADER_LEN, MAX_PAYLOAD};
use crate::packet::Packet;
use crate::Error;

impl<'a, M, SPI, RESET, IRQ, D, C> Radio<'a, M, SPI, RESET, IRQ, D, C>
where
    M: RawMutex,
    SPI: SpiDevice,
    RESET: OutputPin,
    IRQ: Wait,
    D: DelayNs + Clone,
    C: Clock,
{
    /// Takes one frame out of the FIFO.
    ///
    /// Returns the packet to deliver, or `None` for acknowledgements and
    /// frames addressed to other nodes.
    pub(super) async fn receive(&self, chip: &mut Chip<SPI>) -> Result<Option<Packet>, Error> {
        let mut raw = [0u8; HEADER_LEN];
        chip.read_fifo(&mut raw).await?;
        let header = Header::from_bytes(raw);
        if self.config.verbose {
            debug!("rx header {:?}", raw);
        }

        let own = self.config.address;
        if !self.config.promiscuous && header.target != own && header.target != BROADCAST {
            trace!("dropping frame for {}", header.target);
            return Ok(None);
        }

        let now = self.clock.now_ms();
        self.peers
            .lock(|peers| peers.borrow_mut().get_or_insert(header.sender).map(|_| ()))?;

        if header.is_ack() {
            // In promiscuous mode acks meant for other nodes pass the filter
            if header.target == own {
                let fresh = self
                    .peers
                    .lock(|peers| peers.borrow_mut().mark_acked(header.sender, now));
                trace!("ack from {}, fresh {}", header.sender, fresh);
            }
            return Ok(None);
        }

        let mut buf = [0u8; MAX_PAYLOAD];
        let payload = &mut buf[..header.payload_len()];
        chip.read_fifo(payload).await?;
        let rssi = chip.read_rssi().await?;
        if self.config.verbose {
            debug!("rx from {} rssi {} payload {:?}", header.sender, rssi, payload);
        }

        let mut packet = Packet::received(
            header.target,
            header.sender,
            payload,
            header.ack_requested(),
            rssi,
            now,
        );

        if header.ack_requested() && self.config.auto_acknowledge && header.target == own {
            self.send_ack(chip, header.sender).await?;
            packet.has_ack = true;
        }

        self.peers
            .lock(|peers| peers.borrow_mut().record_received(packet.clone()))?;
        Ok(Some(packet))
    }

    /// Transmits an acknowledgement and waits for it to leave the FIFO.
    async fn send_ack(&self, chip: &mut Chip<SPI>, to: u8) -> Result<(), Error> {
        trace!("ack to {}", to);
        let mut delay = self.delay.clone();
        chip.transmit(&frame::encode_ack(to, self.config.address), &mut delay)
            .await?;
        if !chip.wait_packet_sent(&mut delay).await? {
            warn!("ack to {} not confirmed sent", to);
        }
        Ok(())
    }
}
