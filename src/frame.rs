//! Over-the-air frame format
//!
//! ```text
//! +--------+--------+--------+---------+-------------------+
//! | length | target | sender | control | payload (0..=66)  |
//! +--------+--------+--------+---------+-------------------+
//! ```
//!
//! `length` counts every byte after itself, so it is `payload.len() + 3`.
//! Acknowledgements are header-only frames with [`Control::ACK`] set.

use bitflags::bitflags;

/// Largest payload a frame carries. Longer payloads are truncated.
pub const MAX_PAYLOAD: usize = 66;

/// Reserved target address heard by every node.
pub const BROADCAST: u8 = 255;

/// Size of the fixed frame header, length byte included.
pub const HEADER_LEN: usize = 4;

/// Largest encoded frame.
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD;

bitflags! {
    /// Frame control byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u8 {
        /// This frame acknowledges the sender's last packet
        const ACK = 0x80;
        /// The sender wants this frame acknowledged
        const ACK_REQUESTED = 0x40;
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Bytes following the length byte
    pub length: u8,
    /// Destination address
    pub target: u8,
    /// Source address
    pub sender: u8,
    /// Control flags, unknown bits dropped
    pub control: Control,
}

impl Header {
    /// Decodes the 4 header bytes read from the FIFO.
    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            length: bytes[0],
            target: bytes[1],
            sender: bytes[2],
            control: Control::from_bits_truncate(bytes[3]),
        }
    }

    /// Payload bytes still waiting in the FIFO.
    pub fn payload_len(&self) -> usize {
        usize::from(self.length.saturating_sub(3)).min(MAX_PAYLOAD)
    }

    /// Whether this frame is an acknowledgement.
    pub fn is_ack(&self) -> bool {
        self.control.contains(Control::ACK)
    }

    /// Whether the sender asked for an acknowledgement.
    pub fn ack_requested(&self) -> bool {
        self.control.contains(Control::ACK_REQUESTED)
    }
}

/// Encodes a frame. Payload beyond [`MAX_PAYLOAD`] bytes is dropped.
pub fn encode(
    target: u8,
    sender: u8,
    control: Control,
    payload: &[u8],
) -> heapless::Vec<u8, MAX_FRAME> {
    let payload = &payload[..payload.len().min(MAX_PAYLOAD)];
    let mut frame = heapless::Vec::new();
    // Capacity covers the header plus the truncated payload
    let _ = frame.extend_from_slice(&[payload.len() as u8 + 3, target, sender, control.bits()]);
    let _ = frame.extend_from_slice(payload);
    frame
}

/// Header-only acknowledgement from `sender` back to `target`.
pub fn encode_ack(target: u8, sender: u8) -> [u8; HEADER_LEN] {
    [3, target, sender, Control::ACK.bits()]
}
