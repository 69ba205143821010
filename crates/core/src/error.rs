use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlightGuardError {
    #[error("Invalid message type: 0x{0:02x}")]
    InvalidMessageType(u8),

    #[error("Unexpected message type: expected {expected:?}, got {actual:?}")]
    UnexpectedMessageType {
        expected: crate::MessageType,
        actual: crate::MessageType,
    },

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Unrecognized datagram of {0} bytes")]
    UnrecognizedDatagram(usize),

    #[error("Invalid section size: expected {expected}, got {actual}")]
    SectionSize { expected: usize, actual: usize },

    #[error("Relay path is full")]
    PathOverflow,

    #[error("Invalid peer key")]
    InvalidPeerKey,

    #[error("Handshake authentication failed")]
    HandshakeAuthenticationFailed,

    #[error("Transport failure: {0}")]
    TransportFailure(String),
}

pub type Result<T> = std::result::Result<T, FlightGuardError>;
