//! Staged bring-up
//!
//! Reset, handshake, configure, arm interrupt, ready. Each stage has to
//! succeed before the next one starts, and a failure anywhere means no
//! [`Radio`] is built.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiDevice;

use super::{Clock, Radio};
use crate::chip::Chip;
use crate::config::RadioConfig;
use crate::device::Device;
use crate::mode::Mode;
use crate::peer::PeerTable;
use crate::registers::{IrqFlags1, IrqFlags1Bits, SyncValue1};
use crate::Error;

const RESET_PULSE_MS: u32 = 50;
const RESET_SETTLE_MS: u32 = 50;

const HANDSHAKE_PROBES: [u8; 2] = [0xAA, 0x55];
const HANDSHAKE_INTERVAL_MS: u32 = 100;
const HANDSHAKE_SETTLE_MS: u32 = 20;
const HANDSHAKE_TIMEOUT_MS: u32 = 1600;

const MODE_READY_POLL_MS: u32 = 10;
const MODE_READY_TIMEOUT_MS: u32 = 1600;

/// Bring-up stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// Pulse the reset line
    Reset,
    /// Check the chip echoes writes to a scratch register
    Handshake,
    /// Baseline table, encryption, amplifiers, output power
    Configure,
    /// Take over the interrupt line
    ArmInterrupt,
    /// Wait for mode ready and start receiving
    Ready,
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
    /// Brings the transceiver up and returns a driver in receive mode.
    ///
    /// # Errors
    /// * [`Error::HandshakeTimeout`] - the chip did not answer on the bus
    /// * [`Error::ModeReadyTimeout`] - the chip never reported mode ready
    /// * [`Error::Pin`] - the reset line could not be driven
    /// * [`Error::Bus`] - SPI communication failed
    pub async fn initialize(
        spi: SPI,
        mut reset: RESET,
        irq: IRQ,
        delay: D,
        clock: C,
        config: RadioConfig,
    ) -> Result<Self, Error> {
        let mut wait = delay.clone();

        debug!("bring-up: {:?}", Stage::Reset);
        reset_pulse(&mut reset, &mut wait).await?;

        debug!("bring-up: {:?}", Stage::Handshake);
        let mut device = Device::new(spi);
        handshake(&mut device, &mut wait).await?;

        debug!("bring-up: {:?}", Stage::Configure);
        let mut chip = Chip::new(device, config.high_power);
        chip.apply_baseline(config.frequency_band, config.network_id)
            .await?;
        chip.set_encryption(config.encryption_key.as_ref()).await?;
        chip.set_high_power(config.high_power).await?;
        chip.set_power_level(config.power_level_percent).await?;

        debug!("bring-up: {:?}", Stage::ArmInterrupt);
        let irq = Mutex::new(irq);

        debug!("bring-up: {:?}", Stage::Ready);
        wait_mode_ready(&mut chip, &mut wait).await?;
        chip.set_mode(Mode::Receive).await?;

        info!(
            "radio ready, address {} network {}",
            config.address, config.network_id
        );

        Ok(Self {
            chip: Mutex::new(chip),
            irq,
            reset,
            peers: BlockingMutex::new(RefCell::new(PeerTable::new())),
            callbacks: BlockingMutex::new(RefCell::new(heapless::Vec::new())),
            delay,
            clock,
            config,
        })
    }
}

async fn reset_pulse<RESET, D>(reset: &mut RESET, delay: &mut D) -> Result<(), Error>
where
    RESET: OutputPin,
    D: DelayNs,
{
    reset.set_high().map_err(|_| Error::Pin)?;
    delay.delay_ms(RESET_PULSE_MS).await;
    reset.set_low().map_err(|_| Error::Pin)?;
    delay.delay_ms(RESET_SETTLE_MS).await;
    Ok(())
}

/// Writes each probe to SYNCVALUE1 until it reads back unchanged.
async fn handshake<SPI, D>(device: &mut Device<SPI>, delay: &mut D) -> Result<(), Error>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    for probe in HANDSHAKE_PROBES {
        let mut elapsed = 0;
        loop {
            device.write_register(SyncValue1 { value: probe }).await?;
            delay.delay_ms(HANDSHAKE_SETTLE_MS).await;
            let echo: SyncValue1 = device.read_register().await?;
            if echo.value == probe {
                trace!("handshake {} ok", probe);
                break;
            }

            elapsed += HANDSHAKE_INTERVAL_MS;
            if elapsed >= HANDSHAKE_TIMEOUT_MS {
                error!("no handshake echo for {}", probe);
                return Err(Error::HandshakeTimeout { probe });
            }
            delay
                .delay_ms(HANDSHAKE_INTERVAL_MS - HANDSHAKE_SETTLE_MS)
                .await;
        }
    }
    Ok(())
}

async fn wait_mode_ready<SPI, D>(chip: &mut Chip<SPI>, delay: &mut D) -> Result<(), Error>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    let mut elapsed = 0;
    loop {
        let flags: IrqFlags1 = chip.device.read_register().await?;
        if flags.flags.contains(IrqFlags1Bits::MODE_READY) {
            return Ok(());
        }
        if elapsed >= MODE_READY_TIMEOUT_MS {
            return Err(Error::ModeReadyTimeout);
        }
        delay.delay_ms(MODE_READY_POLL_MS).await;
        elapsed += MODE_READY_POLL_MS;
    }
}
