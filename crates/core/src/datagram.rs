//! Inbound datagram classification
//!
//! The transport carries no framing, so a datagram is identified by its
//! size: probes and acks have fixed lengths that no data packet can have.

use crate::{
    Ack, DataPacket, FlightGuardError, MessageType, Ping, Result, ACK_WIRE_LEN, PROBE_WIRE_LEN,
};

/// A decoded inbound datagram
#[derive(Debug, Clone)]
pub enum Datagram {
    /// Ping or Pong; the two share a layout
    Probe(Ping),
    Ack(Ack),
    Data(DataPacket),
}

impl Datagram {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            PROBE_WIRE_LEN => Ok(Datagram::Probe(Ping::from_wire(bytes)?)),
            ACK_WIRE_LEN => Ok(Datagram::Ack(Ack::from_wire(bytes)?)),
            len if DataPacket::path_len_for(len).is_some() => {
                let packet = DataPacket::from_bytes(bytes)?;
                if packet.header.message_type != MessageType::DataRelay {
                    return Err(FlightGuardError::UnexpectedMessageType {
                        expected: MessageType::DataRelay,
                        actual: packet.header.message_type,
                    });
                }
                Ok(Datagram::Data(packet))
            }
            len => Err(FlightGuardError::UnrecognizedDatagram(len)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Datagram::Probe(ping) => ping.to_wire(),
            Datagram::Ack(ack) => ack.to_wire(),
            Datagram::Data(packet) => packet.to_bytes(),
        }
    }
}
