//! FlightGuard Relay
//!
//! Relay node logic: append this node to a packet's hop path, acknowledge
//! it with a signed time-of-flight, keep a table of neighbors, and ping
//! neighbors whose latency has degraded.

mod cache;
mod error;
mod neighbor;
mod node;
mod service;
mod transport;

pub use cache::{PendingPings, PingClaim};
pub use error::{RelayError, TransportError};
pub use neighbor::{NeighborInfo, NeighborTable};
pub use node::{
    AckOutcome, DatagramOutcome, PacketOutcome, ProbeOutcome, RejectReason, RelayConfig, RelayNode,
    DEFAULT_LATENCY_THRESHOLD_MS,
};
pub use service::{RelayService, MAX_DATAGRAM_SIZE};
pub use transport::{MemoryTransport, SentDatagram, Transport, UdpTransport};
