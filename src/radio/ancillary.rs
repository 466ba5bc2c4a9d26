//! Temperature, calibration, power and RSSI

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiDevice;

use super::{Clock, Radio};
use crate::chip::Chip;
use crate::mode::Mode;
use crate::registers::{Osc1, Osc1Bits, Temp1, Temp1Bits, Temp2};
use crate::Error;

/// Offset that puts the raw sensor reading in the right range.
pub const COURSE_TEMP_COEF: i32 = -90;

const TEMPERATURE_POLL_MS: u32 = 50;
const TEMPERATURE_TIMEOUT_MS: u32 = 1000;

const CALIBRATION_POLL_MS: u32 = 20;
const CALIBRATION_TIMEOUT_MS: u32 = 1000;

impl<SPI> Chip<SPI>
where
    SPI: SpiDevice,
{
    async fn measure_temperature<D: DelayNs>(&mut self, delay: &mut D) -> Result<u8, Error> {
        self.device
            .write_register(Temp1 {
                flags: Temp1Bits::MEAS_START,
            })
            .await?;

        let mut waited = 0;
        loop {
            let status: Temp1 = self.device.read_register().await?;
            if !status.flags.contains(Temp1Bits::MEAS_RUNNING) {
                break;
            }
            if waited >= TEMPERATURE_TIMEOUT_MS {
                return Err(Error::TemperatureTimeout);
            }
            delay.delay_ms(TEMPERATURE_POLL_MS).await;
            waited += TEMPERATURE_POLL_MS;
        }

        let reading: Temp2 = self.device.read_register().await?;
        Ok(reading.raw)
    }

    async fn calibrate_rc<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.device
            .write_register(Osc1 {
                flags: Osc1Bits::RC_CAL_START,
            })
            .await?;

        let mut waited = 0;
        loop {
            let status: Osc1 = self.device.read_register().await?;
            if status.flags.contains(Osc1Bits::RC_CAL_DONE) {
                return Ok(());
            }
            if waited >= CALIBRATION_TIMEOUT_MS {
                return Err(Error::CalibrationTimeout);
            }
            delay.delay_ms(CALIBRATION_POLL_MS).await;
            waited += CALIBRATION_POLL_MS;
        }
    }
}

/// Converts a raw TEMP2 reading to °C.
pub fn temperature_from_raw(raw: u8, cal_factor: i16) -> i16 {
    let celsius = -(!i32::from(raw)) + COURSE_TEMP_COEF + i32::from(cal_factor);
    celsius.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
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
    /// Reads the on-chip temperature sensor.
    ///
    /// `cal_factor` is added to the result. The chip is measured in Standby
    /// and put back into its previous mode afterwards, also on timeout.
    pub async fn read_temperature(&self, cal_factor: i16) -> Result<i16, Error> {
        let mut chip = self.chip.lock().await;
        let mut delay = self.delay.clone();

        let previous = chip.mode();
        chip.set_mode(Mode::Standby).await?;
        let measured = chip.measure_temperature(&mut delay).await;
        chip.set_mode(previous).await?;

        let celsius = temperature_from_raw(measured?, cal_factor);
        debug!("temperature {} C", celsius);
        Ok(celsius)
    }

    /// Runs the RC oscillator calibration.
    pub async fn calibrate(&self) -> Result<(), Error> {
        let mut delay = self.delay.clone();
        self.chip.lock().await.calibrate_rc(&mut delay).await?;
        debug!("RC oscillator calibrated");
        Ok(())
    }

    /// Sets the transmit power, 0..=100 %.
    pub async fn set_power_level(&self, percent: u8) -> Result<(), Error> {
        let mut chip = self.chip.lock().await;
        chip.set_power_level(percent).await?;
        debug!("power level {}% ({})", percent, chip.power_level());
        Ok(())
    }

    /// Samples the current signal strength in dBm.
    pub async fn read_rssi(&self) -> Result<i16, Error> {
        self.chip.lock().await.read_rssi().await
    }
}
