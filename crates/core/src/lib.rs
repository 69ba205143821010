//! FlightGuard Core Types
//!
//! This crate defines the packet model shared by every FlightGuard node:
//! signed probes and acknowledgments, the fixed-size relay packet with its
//! integrity hash, and the byte layouts they travel in.

mod datagram;
mod error;
mod packet;
mod time;
mod types;

pub use datagram::*;
pub use error::*;
pub use packet::*;
pub use time::*;
pub use types::*;
