//! Sent and received packets

use crate::frame::MAX_PAYLOAD;

/// Packet payload storage.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// A packet this node sent or received.
///
/// Sent packets live in the peer table and pick up `has_ack`, `ack_at_ms`
/// and `attempts` while the send runs. Received packets never change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    /// Destination address
    pub target: u8,
    /// Source address
    pub sender: u8,
    /// Payload, at most 66 bytes
    pub payload: Payload,
    /// The sender asked for an acknowledgement
    pub requires_ack: bool,
    /// An acknowledgement came back (sent packets only)
    pub has_ack: bool,
    /// Creation time
    pub created_at_ms: u64,
    /// Time the acknowledgement arrived
    pub ack_at_ms: Option<u64>,
    /// Transmissions made (sent packets only)
    pub attempts: u8,
    /// Signal strength in dBm (received packets only)
    pub rssi: Option<i16>,
}

impl Packet {
    /// Builds an outgoing packet. `payload` is truncated to 66 bytes.
    pub fn outgoing(
        target: u8,
        sender: u8,
        payload: &[u8],
        requires_ack: bool,
        now_ms: u64,
    ) -> Self {
        Self {
            target,
            sender,
            payload: truncated(payload),
            requires_ack,
            has_ack: false,
            created_at_ms: now_ms,
            ack_at_ms: None,
            attempts: 0,
            rssi: None,
        }
    }

    /// Builds a packet taken off the air.
    pub fn received(
        target: u8,
        sender: u8,
        payload: &[u8],
        requires_ack: bool,
        rssi: i16,
        now_ms: u64,
    ) -> Self {
        Self {
            rssi: Some(rssi),
            ..Self::outgoing(target, sender, payload, requires_ack, now_ms)
        }
    }

    /// Time between creation and acknowledgement.
    pub fn ack_latency_ms(&self) -> Option<u64> {
        self.ack_at_ms
            .map(|ack_at| ack_at.saturating_sub(self.created_at_ms))
    }

    /// Records an acknowledgement. Only the first one counts.
    ///
    /// Returns whether this call flipped `has_ack`.
    pub fn mark_acked(&mut self, now_ms: u64) -> bool {
        if self.has_ack {
            return false;
        }
        self.has_ack = true;
        self.ack_at_ms = Some(now_ms);
        true
    }
}

fn truncated(payload: &[u8]) -> Payload {
    let payload = &payload[..payload.len().min(MAX_PAYLOAD)];
    Payload::from_slice(payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_recorded_once() {
        let mut packet = Packet::outgoing(2, 1, b"hi", true, 1000);
        assert_eq!(packet.ack_latency_ms(), None);

        assert!(packet.mark_acked(1040));
        assert!(!packet.mark_acked(1200));
        assert!(packet.has_ack);
        assert_eq!(packet.ack_latency_ms(), Some(40));
    }

    #[test]
    fn test_payload_truncated() {
        let packet = Packet::outgoing(2, 1, &[7; 80], false, 0);
        assert_eq!(packet.payload.len(), MAX_PAYLOAD);
    }

    #[test]
    fn test_received_carries_rssi() {
        let packet = Packet::received(1, 2, b"ping", false, -48, 5);
        assert_eq!(packet.rssi, Some(-48));
        assert!(!packet.has_ack);
        assert_eq!(packet.payload.as_slice(), b"ping");
    }
}
