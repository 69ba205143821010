use std::net::SocketAddr;

use flightguard_core::FlightGuardError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to bind to {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Failed to send to {dest}: {reason}")]
    Send { dest: SocketAddr, reason: String },

    #[error("Failed to receive: {0}")]
    Recv(String),

    #[error("Transport closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Packet error: {0}")]
    Packet(#[from] FlightGuardError),

    #[error("Relay path is full")]
    PathOverflow,
}

impl From<RelayError> for FlightGuardError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Transport(e) => FlightGuardError::TransportFailure(e.to_string()),
            RelayError::Packet(e) => e,
            RelayError::PathOverflow => FlightGuardError::PathOverflow,
        }
    }
}
