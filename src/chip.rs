//! Transceiver state owned by the driver
//!
//! [`Chip`] pairs the register bus with everything the driver remembers
//! about the hardware: the current [`Mode`], whether the module is a high
//! power (PA_BOOST) part, and the programmed output power. All of it sits
//! behind a single lock in [`Radio`](crate::Radio), so multi-step register
//! sequences never interleave.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;

use crate::config::{baseline, FrequencyBand};
use crate::device::Device;
use crate::mode::Mode;
use crate::registers::{
    IrqFlags2, IrqFlags2Bits, Ocp, PaLevel, PaSelect, PacketConfig2, RssiValue, AES_KEY, FIFO,
    MAX_OUTPUT_POWER,
};
use crate::Error;

const PACKET_SENT_POLL_MS: u32 = 1;
const PACKET_SENT_TIMEOUT_MS: u32 = 50;

/// Register bus plus cached transceiver state.
pub struct Chip<SPI> {
    pub(crate) device: Device<SPI>,
    pub(crate) mode: Mode,
    pub(crate) high_power: bool,
    pub(crate) power_level: u8,
}

impl<SPI> Chip<SPI> {
    /// Wraps a device that is in Standby, which is where both the power-on
    /// reset and the baseline table leave it.
    pub fn new(device: Device<SPI>, high_power: bool) -> Self {
        Self {
            device,
            mode: Mode::Standby,
            high_power,
            power_level: 0,
        }
    }

    /// Current operating mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Programmed 5-bit output power.
    pub fn power_level(&self) -> u8 {
        self.power_level
    }

    /// Whether PA1 + PA2 are in use.
    pub fn is_high_power(&self) -> bool {
        self.high_power
    }

    /// Gives the register bus back.
    pub fn release(self) -> Device<SPI> {
        self.device
    }
}

impl<SPI> Chip<SPI>
where
    SPI: SpiDevice,
{
    /// Replays the baseline register table for `band` and `network_id`.
    pub async fn apply_baseline(
        &mut self,
        band: FrequencyBand,
        network_id: u8,
    ) -> Result<(), Error> {
        for (address, value) in baseline(band, network_id) {
            self.device.write_raw(address, value).await?;
        }
        // The table sets OPMODE to Standby
        self.mode = Mode::Standby;
        Ok(())
    }

    /// Programs the AES key, or disables AES when `key` is `None`.
    ///
    /// The key registers are only writable in Standby, so the chip is
    /// parked there for the duration and returned to its previous mode.
    pub async fn set_encryption(&mut self, key: Option<&[u8; 16]>) -> Result<(), Error> {
        match key {
            Some(key) => {
                let previous = self.mode;
                self.set_mode(Mode::Standby).await?;
                self.device.write_burst(AES_KEY, key).await?;
                self.set_aes(true).await?;
                self.set_mode(previous).await
            }
            None => self.set_aes(false).await,
        }
    }

    async fn set_aes(&mut self, enabled: bool) -> Result<(), Error> {
        let config: PacketConfig2 = self.device.read_register().await?;
        self.device
            .write_register(PacketConfig2 {
                aes: enabled,
                ..config
            })
            .await?;
        Ok(())
    }

    /// Switches between the PA_BOOST amplifiers (PA1 + PA2) and PA0.
    pub async fn set_high_power(&mut self, on: bool) -> Result<(), Error> {
        if on {
            self.device.write_register(Ocp::OFF).await?;
            let level: PaLevel = self.device.read_register().await?;
            self.device
                .write_register(PaLevel {
                    amplifiers: PaSelect::PA1 | PaSelect::PA2,
                    ..level
                })
                .await?;
        } else {
            self.device.write_register(Ocp::ON).await?;
            self.device
                .write_register(PaLevel {
                    amplifiers: PaSelect::PA0,
                    output_power: self.power_level,
                })
                .await?;
        }
        self.high_power = on;
        Ok(())
    }

    /// Sets the output power as a percentage of the 5-bit range.
    ///
    /// `percent` is clamped to 100. The amplifier selection bits are left
    /// untouched.
    pub async fn set_power_level(&mut self, percent: u8) -> Result<(), Error> {
        let level = power_level_from_percent(percent);
        let current: PaLevel = self.device.read_register().await?;
        self.device
            .write_register(PaLevel {
                output_power: level,
                ..current
            })
            .await?;
        self.power_level = level;
        Ok(())
    }

    /// Samples the RSSI register, in dBm.
    pub async fn read_rssi(&mut self) -> Result<i16, Error> {
        let rssi: RssiValue = self.device.read_register().await?;
        Ok(-i16::from(rssi.value))
    }

    /// Reads IRQFLAGS2.
    pub async fn irq_flags(&mut self) -> Result<IrqFlags2Bits, Error> {
        let flags: IrqFlags2 = self.device.read_register().await?;
        Ok(flags.flags)
    }

    /// Polls IRQFLAGS2 until PacketSent is up, for at most 50 ms.
    ///
    /// Returns whether the frame left the chip in time.
    pub async fn wait_packet_sent<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool, Error> {
        let mut waited = 0;
        while !self.irq_flags().await?.contains(IrqFlags2Bits::PACKET_SENT) {
            if waited >= PACKET_SENT_TIMEOUT_MS {
                return Ok(false);
            }
            delay.delay_ms(PACKET_SENT_POLL_MS).await;
            waited += PACKET_SENT_POLL_MS;
        }
        Ok(true)
    }

    /// Loads `frame` into the FIFO and starts transmitting.
    ///
    /// The FIFO may only be filled outside of Transmit, and the chip starts
    /// sending as soon as it enters Transmit with a non-empty FIFO. A frame
    /// still on the air from an earlier call is given time to finish first,
    /// since leaving Transmit would cut it off.
    pub async fn transmit<D: DelayNs>(
        &mut self,
        frame: &[u8],
        delay: &mut D,
    ) -> Result<(), Error> {
        if self.mode == Mode::Transmit && !self.wait_packet_sent(delay).await? {
            warn!("previous frame never reported sent");
        }
        self.set_mode(Mode::Standby).await?;
        self.device.write_burst(FIFO, frame).await?;
        self.set_mode(Mode::Transmit).await
    }

    /// Reads `buf.len()` bytes out of the FIFO.
    pub async fn read_fifo(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.device.read_burst(FIFO, buf).await?;
        Ok(())
    }
}

/// `round(31 * percent / 100)` with `percent` clamped to 100.
pub(crate) fn power_level_from_percent(percent: u8) -> u8 {
    let percent = u16::from(percent.min(100));
    let level = (percent * u16::from(MAX_OUTPUT_POWER) + 50) / 100;
    level as u8
}
