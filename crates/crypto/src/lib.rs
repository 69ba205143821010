//! FlightGuard Cryptography
//!
//! Node identities, signed probes and acks, the authenticated key
//! exchange, and the fixed-size section cipher.

mod encrypt;
mod handshake;
mod identity;
mod keys;
mod provider;
mod sign;

pub use encrypt::*;
pub use handshake::*;
pub use identity::*;
pub use keys::*;
pub use provider::*;
pub use sign::*;
