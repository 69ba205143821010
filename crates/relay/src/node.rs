//! Relay node
//!
//! Handles one node's side of the relay protocol:
//! 1. Append this node to each inbound packet's hop path
//! 2. Acknowledge the packet with a signed time-of-flight
//! 3. Track neighbors and their latest latency
//! 4. Re-probe neighbors whose latency has degraded

use std::net::SocketAddr;

use tracing::{debug, info, trace, warn};

use flightguard_core::{
    time_of_flight_ms, Ack, Clock, DataPacket, Datagram, Id, MessageType, PayloadHash, Ping,
    Pong, SystemClock,
};
use flightguard_crypto::{random_nonce, sign_ack, sign_ping, sign_pong, verify_ack, verify_ping, Identity};

use crate::cache::{PendingPings, PingClaim};
use crate::error::RelayError;
use crate::neighbor::{NeighborInfo, NeighborTable};
use crate::transport::Transport;

/// Neighbors slower than this are re-probed
pub const DEFAULT_LATENCY_THRESHOLD_MS: u32 = 5000;

/// Relay node configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Strictly greater latencies trigger a ping
    pub latency_threshold_ms: u32,
    /// Reject packets whose payload hash does not match their origin fields
    pub verify_payload_hash: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            latency_threshold_ms: DEFAULT_LATENCY_THRESHOLD_MS,
            verify_payload_hash: true,
        }
    }
}

/// Why an inbound message was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    PayloadHashMismatch,
    NotDataRelay(MessageType),
    BadSignature,
    /// A probe carrying our own identity
    OwnProbe,
    /// A probe whose nonce we already answered
    ReplayedProbe,
    /// A pong for one of our nonces, signed by a different peer
    PongFromWrongPeer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Hop appended and the ack sent back to the source
    Acknowledged(Ack),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Answer to one of our pings; the round trip was recorded
    PongMatched { peer: Id, rtt_ms: u32 },
    /// A peer's ping; we replied
    PongSent { peer: Id, pong: Pong },
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Verified(Id),
    /// The signature does not match the neighbor at the source address
    Unverified,
    /// No neighbor is recorded at the source address
    UnknownSender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramOutcome {
    Packet(PacketOutcome),
    Probe(ProbeOutcome),
    Ack(AckOutcome),
}

/// One relay node bound to a transport
pub struct RelayNode<T: Transport, C: Clock = SystemClock> {
    identity: Identity,
    aircraft_id: Id,
    transport: T,
    clock: C,
    config: RelayConfig,
    neighbors: NeighborTable,
    /// Pings we sent, awaiting a pong
    pending: PendingPings,
    /// Pings we answered, so an echoed pong is not answered again
    answered: PendingPings,
}

impl<T: Transport> RelayNode<T, SystemClock> {
    pub fn new(identity: Identity, transport: T, config: RelayConfig) -> Self {
        Self::with_clock(identity, transport, config, SystemClock)
    }
}

impl<T: Transport, C: Clock> RelayNode<T, C> {
    pub fn with_clock(identity: Identity, transport: T, config: RelayConfig, clock: C) -> Self {
        let aircraft_id = identity.aircraft_id();
        Self {
            identity,
            aircraft_id,
            transport,
            clock,
            config,
            neighbors: NeighborTable::new(),
            pending: PendingPings::new(),
            answered: PendingPings::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn aircraft_id(&self) -> Id {
        self.aircraft_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // =========================================================================
    // Neighbors
    // =========================================================================

    /// Seed a neighbor whose latency is not yet known.
    ///
    /// A neighbor already in the table keeps its observed latency and
    /// address. Returns true if the neighbor was new.
    pub fn add_neighbor(&self, id: Id, addr: SocketAddr) -> bool {
        let info = NeighborInfo {
            last_seen: self.clock.now_secs(),
            rtt_ms: 0,
            addr,
        };
        let added = self.neighbors.insert_if_absent(id, info);
        if added {
            info!("Added neighbor {} at {}", hex::encode(&id[..8]), addr);
        } else {
            debug!("Neighbor {} already known", hex::encode(&id[..8]));
        }
        added
    }

    pub fn remove_neighbor(&self, id: &Id) -> Option<NeighborInfo> {
        self.neighbors.remove(id)
    }

    pub fn neighbor(&self, id: &Id) -> Option<NeighborInfo> {
        self.neighbors.get(id)
    }

    /// Snapshot of the neighbor table
    pub fn neighbors(&self) -> Vec<(Id, NeighborInfo)> {
        self.neighbors.snapshot()
    }

    fn observe(&self, peer: Id, rtt_ms: u32, addr: SocketAddr, now_millis: u64) {
        let info = NeighborInfo {
            last_seen: now_millis / 1000,
            rtt_ms,
            addr,
        };
        if self.neighbors.upsert(peer, info) {
            info!(
                "Discovered neighbor {} at {} ({} ms)",
                hex::encode(&peer[..8]),
                addr,
                rtt_ms
            );
        } else {
            trace!("Neighbor {} now {} ms", hex::encode(&peer[..8]), rtt_ms);
        }
    }

    // =========================================================================
    // Data packets
    // =========================================================================

    /// Process an inbound data packet from `source`.
    ///
    /// The sender is the last hop on the path, or, for a packet fresh from
    /// its origin, the neighbor recorded at `source`. This node is appended
    /// to the path, the sender's latency is updated, and an ack carrying
    /// the packet's payload hash and time-of-flight is sent to `source`.
    /// The ack is sent once; a failed send is returned, not retried.
    pub async fn handle_packet(
        &self,
        packet: &mut DataPacket,
        source: SocketAddr,
    ) -> Result<PacketOutcome, RelayError> {
        let header = &packet.header;
        if header.message_type != MessageType::DataRelay {
            debug!("Dropping {:?} packet from {}", header.message_type, source);
            return Ok(PacketOutcome::Rejected(RejectReason::NotDataRelay(
                header.message_type,
            )));
        }

        if self.config.verify_payload_hash && !packet.verify_origin_hash() {
            warn!(
                "Payload hash mismatch on packet {} from {}",
                hex::encode(&header.payload_hash[..8]),
                source
            );
            return Ok(PacketOutcome::Rejected(RejectReason::PayloadHashMismatch));
        }

        let sender = header
            .last_hop()
            .map(|entry| entry.aircraft_id)
            .or_else(|| self.neighbors.find_by_addr(&source));

        let hop_number = packet
            .header
            .append_hop(self.aircraft_id)
            .map_err(|_| RelayError::PathOverflow)?;

        let now_millis = self.clock.now_millis();
        let tof_ms = time_of_flight_ms(packet.header.timestamp_utc, now_millis);

        match sender {
            Some(peer) if peer != self.aircraft_id => {
                self.observe(peer, tof_ms, source, now_millis);
            }
            Some(_) => debug!("Packet looped back through this node"),
            None => debug!("Packet from unknown origin at {}", source),
        }

        debug!(
            "Relayed packet {} as hop {} ({} ms in flight)",
            hex::encode(&packet.header.payload_hash[..8]),
            hop_number,
            tof_ms
        );

        let ack = self
            .send_ack(packet.header.payload_hash, tof_ms, source)
            .await?;
        Ok(PacketOutcome::Acknowledged(ack))
    }

    /// Sign an ack and send it to `addr` as a single datagram
    pub async fn send_ack(
        &self,
        payload_hash: PayloadHash,
        tof_ms: u32,
        addr: SocketAddr,
    ) -> Result<Ack, RelayError> {
        let ack = sign_ack(&self.identity, payload_hash, tof_ms, self.clock.now_secs());
        self.transport.send_to(&ack.to_wire(), addr).await?;
        trace!("Sent ack for {} to {}", hex::encode(&payload_hash[..8]), addr);
        Ok(ack)
    }

    /// Verify an ack against the neighbor recorded at `source`
    pub fn handle_ack(&self, ack: &Ack, source: SocketAddr) -> AckOutcome {
        let Some(peer) = self.neighbors.find_by_addr(&source) else {
            debug!("Ack from unknown address {}", source);
            return AckOutcome::UnknownSender;
        };

        if verify_ack(ack, &peer) {
            debug!(
                "Ack from {} for {} ({} ms)",
                hex::encode(&peer[..8]),
                hex::encode(&ack.payload_hash[..8]),
                ack.time_of_flight_ms
            );
            AckOutcome::Verified(peer)
        } else {
            warn!("Ack signature mismatch from {}", source);
            AckOutcome::Unverified
        }
    }

    // =========================================================================
    // Probes
    // =========================================================================

    /// Ping a known neighbor at its recorded address.
    ///
    /// An unknown peer cannot be addressed, so this is a no-op returning
    /// `Ok(None)`.
    pub async fn send_ping(&self, peer: &Id) -> Result<Option<Ping>, RelayError> {
        let Some(info) = self.neighbors.get(peer) else {
            debug!("Not pinging unknown peer {}", hex::encode(&peer[..8]));
            return Ok(None);
        };

        let nonce = random_nonce();
        let now_millis = self.clock.now_millis();
        let ping = sign_ping(&self.identity, nonce, now_millis / 1000);

        // Recorded first so a fast pong is recognised
        self.pending.insert(nonce, *peer, now_millis);
        if let Err(e) = self.transport.send_to(&ping.to_wire(), info.addr).await {
            self.pending.take(&nonce);
            return Err(e.into());
        }

        debug!("Pinged {} at {}", hex::encode(&peer[..8]), info.addr);
        Ok(Some(ping))
    }

    /// Process an inbound probe.
    ///
    /// A probe echoing one of our outstanding nonces is a pong and records
    /// the measured round trip. Anything else is a ping: the sender is
    /// recorded with its one-way time-of-flight and gets a pong back.
    pub async fn handle_probe(
        &self,
        probe: &Ping,
        source: SocketAddr,
    ) -> Result<ProbeOutcome, RelayError> {
        if probe.aircraft_id == self.aircraft_id {
            return Ok(ProbeOutcome::Rejected(RejectReason::OwnProbe));
        }
        if !verify_ping(probe) {
            warn!("Probe with bad signature from {}", source);
            return Ok(ProbeOutcome::Rejected(RejectReason::BadSignature));
        }

        let peer = probe.aircraft_id;
        let now_millis = self.clock.now_millis();

        match self.pending.take_for(&probe.nonce, &peer) {
            PingClaim::Matched { sent_at_millis } => {
                let rtt_ms =
                    u32::try_from(now_millis.saturating_sub(sent_at_millis)).unwrap_or(u32::MAX);
                self.observe(peer, rtt_ms, source, now_millis);
                debug!("Pong from {} ({} ms round trip)", hex::encode(&peer[..8]), rtt_ms);
                return Ok(ProbeOutcome::PongMatched { peer, rtt_ms });
            }
            PingClaim::WrongPeer { pinged } => {
                warn!(
                    "Pong from {} answers a ping sent to {}",
                    hex::encode(&peer[..8]),
                    hex::encode(&pinged[..8])
                );
                return Ok(ProbeOutcome::Rejected(RejectReason::PongFromWrongPeer));
            }
            PingClaim::Unknown => {}
        }

        if self.answered.contains(&probe.nonce) {
            trace!("Ignoring replayed probe from {}", source);
            return Ok(ProbeOutcome::Rejected(RejectReason::ReplayedProbe));
        }

        let tof_ms = time_of_flight_ms(probe.timestamp_utc, now_millis);
        self.observe(peer, tof_ms, source, now_millis);

        let pong = sign_pong(&self.identity, probe, now_millis / 1000);
        self.answered.insert(probe.nonce, peer, now_millis);
        self.transport.send_to(&pong.to_wire(), source).await?;
        debug!("Answered ping from {} at {}", hex::encode(&peer[..8]), source);

        Ok(ProbeOutcome::PongSent { peer, pong })
    }

    /// Ping every neighbor whose latest latency exceeds the threshold.
    ///
    /// Every slow neighbor is attempted even if an earlier send fails.
    /// Returns the number of pings sent, or the first send error.
    pub async fn monitor_latency(&self) -> Result<usize, RelayError> {
        let threshold = self.config.latency_threshold_ms;
        let slow: Vec<Id> = self
            .neighbors
            .snapshot()
            .into_iter()
            .filter(|(_, info)| info.rtt_ms > threshold)
            .map(|(id, _)| id)
            .collect();

        let mut sent = 0;
        let mut first_error = None;
        for peer in slow {
            match self.send_ping(&peer).await {
                Ok(Some(_)) => sent += 1,
                // Removed since the snapshot was taken
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to ping slow neighbor {}: {}", hex::encode(&peer[..8]), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.pending.evict_expired();
        self.answered.evict_expired();

        match first_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Decode an inbound datagram and route it to the matching handler
    pub async fn handle_datagram(
        &self,
        bytes: &[u8],
        source: SocketAddr,
    ) -> Result<DatagramOutcome, RelayError> {
        match Datagram::from_bytes(bytes)? {
            Datagram::Data(mut packet) => Ok(DatagramOutcome::Packet(
                self.handle_packet(&mut packet, source).await?,
            )),
            Datagram::Probe(probe) => Ok(DatagramOutcome::Probe(
                self.handle_probe(&probe, source).await?,
            )),
            Datagram::Ack(ack) => Ok(DatagramOutcome::Ack(self.handle_ack(&ack, source))),
        }
    }
}
