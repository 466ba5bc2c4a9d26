//! Operating mode state machine
//!
//! The driver is the only writer of OPMODE, so the cached [`Mode`] in
//! [`Chip`] always matches the hardware. Each transition performs the
//! side-effecting writes it needs:
//!
//! | target   | writes                                                   |
//! |----------|----------------------------------------------------------|
//! | Transmit | DIO0 = PacketSent, boost TestPa (high power), OPMODE     |
//! | Receive  | normal TestPa (high power), OPMODE, RX restart if a      |
//! |          | stale PayloadReady is pending, DIO0 = PayloadReady       |
//! | others   | OPMODE                                                   |
//!
//! Repeating the current mode costs no bus traffic.

use embedded_hal_async::spi::SpiDevice;

use crate::chip::Chip;
use crate::registers::{
    Dio0Mapping, DioMapping1, IrqFlags2, IrqFlags2Bits, OpMode, PacketConfig2, TestPa1, TestPa2,
};
use crate::Error;

/// Transceiver operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Lowest power, configuration retained
    Sleep = 0x00,
    /// Crystal oscillator running, used for configuration and FIFO access
    Standby = 0x04,
    /// PLL locked at the carrier frequency
    FrequencySynthesis = 0x08,
    /// Transmitting, starts as soon as the FIFO is not empty
    Transmit = 0x0C,
    /// Receiving
    Receive = 0x10,
}

impl Mode {
    /// OPMODE bits 4:2 for this mode.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decodes OPMODE bits 4:2, `None` for the reserved encodings.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x00 => Some(Self::Sleep),
            0x04 => Some(Self::Standby),
            0x08 => Some(Self::FrequencySynthesis),
            0x0C => Some(Self::Transmit),
            0x10 => Some(Self::Receive),
            _ => None,
        }
    }
}

impl<SPI> Chip<SPI>
where
    SPI: SpiDevice,
{
    /// Switches the transceiver to `target`.
    ///
    /// The cached mode is only updated once every write went through, so a
    /// bus error leaves it at the previous value.
    pub async fn set_mode(&mut self, target: Mode) -> Result<(), Error> {
        if target == self.mode {
            return Ok(());
        }

        match target {
            Mode::Transmit => {
                self.device
                    .write_register(DioMapping1 {
                        dio0: Dio0Mapping::PacketSent,
                    })
                    .await?;
                if self.high_power {
                    self.device.write_register(TestPa1::BOOST).await?;
                    self.device.write_register(TestPa2::BOOST).await?;
                }
                self.write_mode_bits(target).await?;
            }
            Mode::Receive => {
                if self.high_power {
                    self.device.write_register(TestPa1::NORMAL).await?;
                    self.device.write_register(TestPa2::NORMAL).await?;
                }
                self.write_mode_bits(target).await?;
                self.restart_stale_receive().await?;
                self.device
                    .write_register(DioMapping1 {
                        dio0: Dio0Mapping::PayloadReady,
                    })
                    .await?;
            }
            Mode::Sleep | Mode::Standby | Mode::FrequencySynthesis => {
                self.write_mode_bits(target).await?;
            }
        }

        trace!("mode {:?} -> {:?}", self.mode, target);
        self.mode = target;
        Ok(())
    }

    /// Restarts the receiver when PayloadReady is still up from a frame
    /// that was not fully drained. DIO0 would otherwise stay high and never
    /// produce another rising edge.
    async fn restart_stale_receive(&mut self) -> Result<(), Error> {
        let flags: IrqFlags2 = self.device.read_register().await?;
        if flags.flags.contains(IrqFlags2Bits::PAYLOAD_READY) {
            trace!("payload left in FIFO, restarting receiver");
            let config: PacketConfig2 = self.device.read_register().await?;
            self.device
                .write_register(PacketConfig2 {
                    rx_restart: true,
                    ..config
                })
                .await?;
        }
        Ok(())
    }

    async fn write_mode_bits(&mut self, target: Mode) -> Result<(), Error> {
        let opmode: OpMode = self.device.read_register().await?;
        self.device.write_register(opmode.with_mode(target)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::{read, write};
    use crate::Device;
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn expect(groups: &[[SpiTransaction<u8>; 4]]) -> SpiMock<u8> {
        let expectations: Vec<_> = groups.iter().flatten().cloned().collect();
        SpiMock::new(&expectations)
    }

    #[test]
    fn test_mode_bits_roundtrip() {
        for mode in [
            Mode::Sleep,
            Mode::Standby,
            Mode::FrequencySynthesis,
            Mode::Transmit,
            Mode::Receive,
        ] {
            assert_eq!(Mode::from_bits(mode.bits()), Some(mode));
        }
        assert_eq!(Mode::from_bits(0x14), None);
    }

    #[tokio::test]
    async fn test_enter_receive_high_power() {
        let spi = expect(&[
            write(0x5A, 0x55),
            write(0x5C, 0x70),
            read(0x01, 0x04),
            write(0x01, 0x10),
            read(0x28, 0x00),
            write(0x25, 0x40),
        ]);
        let mut chip = Chip::new(Device::new(spi), true);

        chip.set_mode(Mode::Receive).await.unwrap();
        assert_eq!(chip.mode(), Mode::Receive);

        chip.release().release().done();
    }

    #[tokio::test]
    async fn test_enter_transmit_high_power() {
        let spi = expect(&[
            write(0x25, 0x00),
            write(0x5A, 0x5D),
            write(0x5C, 0x7C),
            read(0x01, 0x04),
            write(0x01, 0x0C),
        ]);
        let mut chip = Chip::new(Device::new(spi), true);

        chip.set_mode(Mode::Transmit).await.unwrap();
        assert_eq!(chip.mode(), Mode::Transmit);

        chip.release().release().done();
    }

    #[tokio::test]
    async fn test_low_power_skips_test_registers() {
        let spi = expect(&[
            read(0x01, 0x04),
            write(0x01, 0x10),
            read(0x28, 0x00),
            write(0x25, 0x40),
        ]);
        let mut chip = Chip::new(Device::new(spi), false);

        chip.set_mode(Mode::Receive).await.unwrap();

        chip.release().release().done();
    }

    #[tokio::test]
    async fn test_stale_payload_restarts_receiver() {
        // Header of a frame for another node was read, its payload was not
        let spi = expect(&[
            read(0x01, 0x04),
            write(0x01, 0x10),
            read(0x28, 0x04),
            read(0x3D, 0x12),
            write(0x3D, 0x16),
            write(0x25, 0x40),
        ]);
        let mut chip = Chip::new(Device::new(spi), false);

        chip.set_mode(Mode::Receive).await.unwrap();
        assert_eq!(chip.mode(), Mode::Receive);

        chip.release().release().done();
    }

    #[tokio::test]
    async fn test_repeated_mode_is_free() {
        let spi = expect(&[read(0x01, 0x04), write(0x01, 0x00)]);
        let mut chip = Chip::new(Device::new(spi), true);

        chip.set_mode(Mode::Sleep).await.unwrap();
        chip.set_mode(Mode::Sleep).await.unwrap();
        // Standby is the power-on mode, so this is free as well
        let mut idle = Chip::new(Device::new(SpiMock::<u8>::new(&[])), true);
        idle.set_mode(Mode::Standby).await.unwrap();

        chip.release().release().done();
        idle.release().release().done();
    }

    #[tokio::test]
    async fn test_opmode_keeps_sequencer_bits() {
        let spi = expect(&[read(0x01, 0x84), write(0x01, 0x88)]);
        let mut chip = Chip::new(Device::new(spi), false);

        chip.set_mode(Mode::FrequencySynthesis).await.unwrap();

        chip.release().release().done();
    }
}
