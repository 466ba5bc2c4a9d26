//! Per-address peer records
//!
//! Records live in a small fixed-capacity map and are created explicitly
//! through [`PeerTable::get_or_insert`] the first time a node is sent to or
//! heard from; lookups never create or change anything. When the table is
//! full an idle record (no send in flight) makes room for the new one.

use heapless::FnvIndexMap;

use crate::packet::Packet;
use crate::Error;

/// Default number of peer records, a power of two.
pub const MAX_PEERS: usize = 8;

/// What this node knows about one remote address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Peer {
    /// Address of the remote node
    pub address: u8,
    /// Most recent packet sent to it
    pub last_sent: Option<Packet>,
    /// Most recent packet received from it
    pub last_received: Option<Packet>,
    /// A send to this address is in flight
    pub sending: bool,
}

impl Peer {
    fn new(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

/// Peers keyed by address, at most `N` of them.
pub struct PeerTable<const N: usize = MAX_PEERS> {
    peers: FnvIndexMap<u8, Peer, N>,
}

impl<const N: usize> Default for PeerTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PeerTable<N> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            peers: FnvIndexMap::new(),
        }
    }

    /// Looks up a peer without creating it.
    pub fn get(&self, address: u8) -> Option<&Peer> {
        self.peers.get(&address)
    }

    /// Returns the peer for `address`, creating an empty record first if
    /// the address was never seen.
    ///
    /// # Errors
    /// * [`Error::PeerTableFull`] - the table is full and every peer has a
    ///   send in flight
    pub fn get_or_insert(&mut self, address: u8) -> Result<&mut Peer, Error> {
        if !self.peers.contains_key(&address) {
            if self.peers.len() == self.peers.capacity() {
                self.evict_idle()?;
            }
            self.peers
                .insert(address, Peer::new(address))
                .map_err(|_| Error::PeerTableFull)?;
        }
        self.peers.get_mut(&address).ok_or(Error::PeerTableFull)
    }

    fn evict_idle(&mut self) -> Result<(), Error> {
        let idle = self
            .peers
            .iter()
            .find(|(_, peer)| !peer.sending)
            .map(|(&address, _)| address)
            .ok_or(Error::PeerTableFull)?;
        trace!("evicting peer {}", idle);
        self.peers.remove(&idle);
        Ok(())
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Claims the send slot of `packet.target` and stores `packet` as its
    /// last sent packet.
    pub fn begin_send(&mut self, packet: Packet) -> Result<(), Error> {
        let peer = self.get_or_insert(packet.target)?;
        if peer.sending {
            return Err(Error::AlreadySending {
                address: packet.target,
            });
        }
        peer.sending = true;
        peer.last_sent = Some(packet);
        Ok(())
    }

    /// Releases the send slot of `address`.
    pub fn finish_send(&mut self, address: u8) {
        if let Some(peer) = self.peers.get_mut(&address) {
            peer.sending = false;
        }
    }

    /// Whether an acknowledgement arrived for the last packet sent to
    /// `address`.
    pub fn is_acked(&self, address: u8) -> bool {
        self.get(address)
            .and_then(|peer| peer.last_sent.as_ref())
            .is_some_and(|packet| packet.has_ack)
    }

    /// Marks the last packet sent to `address` as acknowledged.
    ///
    /// Returns `false` when there is nothing to acknowledge or it already
    /// was.
    pub fn mark_acked(&mut self, address: u8, now_ms: u64) -> bool {
        self.peers
            .get_mut(&address)
            .and_then(|peer| peer.last_sent.as_mut())
            .is_some_and(|packet| packet.mark_acked(now_ms))
    }

    /// Stores `packet` as the last one received from its sender.
    pub fn record_received(&mut self, packet: Packet) -> Result<(), Error> {
        let sender = packet.sender;
        self.get_or_insert(sender)?.last_received = Some(packet);
        Ok(())
    }

    /// Records the attempt count on the last packet sent to `address` and
    /// returns a copy of it.
    pub fn record_attempts(&mut self, address: u8, attempts: u8) -> Option<Packet> {
        let packet = self.peers.get_mut(&address)?.last_sent.as_mut()?;
        packet.attempts = attempts;
        Some(packet.clone())
    }
}
