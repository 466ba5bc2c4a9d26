//! Radio configuration and the baseline register table

/// Number of register writes in the baseline table.
pub const BASELINE_LEN: usize = 20;

/// Supported carrier frequency bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrequencyBand {
    /// 315 MHz
    Mhz315,
    /// 433 MHz
    Mhz433,
    /// 868 MHz
    Mhz868,
    /// 915 MHz
    #[default]
    Mhz915,
}

impl FrequencyBand {
    /// FRF register bytes (MSB, MID, LSB) for the band's centre frequency.
    ///
    /// F_RF = FRF * 32 MHz / 2^19
    pub const fn frf(self) -> [u8; 3] {
        match self {
            Self::Mhz315 => [0x4E, 0xC0, 0x00],
            Self::Mhz433 => [0x6C, 0x40, 0x00],
            Self::Mhz868 => [0xD9, 0x00, 0x00],
            Self::Mhz915 => [0xE4, 0xC0, 0x00],
        }
    }
}

/// Settings applied during bring-up.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioConfig {
    /// Carrier band
    pub frequency_band: FrequencyBand,
    /// This node's address, 255 is reserved for broadcast
    pub address: u8,
    /// Second sync word byte. Nodes only hear each other on the same id.
    pub network_id: u8,
    /// RFM69HW/HCW module with PA_BOOST
    pub high_power: bool,
    /// Transmit power, 0..=100 %
    pub power_level_percent: u8,
    /// Accept frames addressed to any node
    pub promiscuous: bool,
    /// Acknowledge received frames that ask for it
    pub auto_acknowledge: bool,
    /// AES-128 key, `None` disables encryption
    pub encryption_key: Option<[u8; 16]>,
    /// How long a send waits for an acknowledgement after each transmission
    pub ack_timeout_ms: u32,
    /// Log every frame at debug level
    pub verbose: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_band: FrequencyBand::default(),
            address: 1,
            network_id: 100,
            high_power: true,
            power_level_percent: 70,
            promiscuous: false,
            auto_acknowledge: true,
            encryption_key: None,
            ack_timeout_ms: 1000,
            verbose: false,
        }
    }
}

/// Baseline register table as (address, value) pairs in write order.
///
/// Packet mode FSK at 55.5 kbps with 50 kHz deviation, variable length
/// packets up to 66 bytes with CRC, sync word `0x2D, network_id`. Leaves
/// the chip in Standby with DIO0 mapped to PayloadReady.
pub fn baseline(band: FrequencyBand, network_id: u8) -> [(u8, u8); BASELINE_LEN] {
    let [frf_msb, frf_mid, frf_lsb] = band.frf();
    [
        // OPMODE: sequencer on, listen off, standby
        (0x01, 0x04),
        // DATAMODUL: packet mode, FSK, no shaping
        (0x02, 0x00),
        // BITRATE: 55.5 kbps
        (0x03, 0x02),
        (0x04, 0x40),
        // FDEV: 50 kHz
        (0x05, 0x03),
        (0x06, 0x33),
        (0x07, frf_msb),
        (0x08, frf_mid),
        (0x09, frf_lsb),
        // RXBW: DCC 4%, mantissa 16, exponent 2
        (0x19, 0x42),
        // DIOMAPPING1: DIO0 = PayloadReady
        (0x25, 0x40),
        // RSSITHRESH: -110 dBm
        (0x29, 220),
        // SYNCCONFIG: sync on, FIFO fill on sync, 2 bytes
        (0x2E, 0x88),
        (0x2F, 0x2D),
        (0x30, network_id),
        // PACKETCONFIG1: variable length, CRC on, no address filtering
        (0x37, 0x90),
        // PAYLOADLENGTH: max receive length
        (0x38, 66),
        // FIFOTHRESH: start TX on FIFO not empty
        (0x3C, 0x8F),
        // PACKETCONFIG2: 2 bit restart delay, auto RX restart, AES off
        (0x3D, 0x12),
        // TESTDAGC: continuous DAGC, low beta off
        (0x6F, 0x30),
    ]
}
