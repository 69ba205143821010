use crate::FlightGuardError;

/// 32-byte aircraft identity (the raw Ed25519 public signing key)
pub type Id = [u8; 32];

/// 32-byte public key
pub type PublicKey = [u8; 32];

/// 64-byte Ed25519 signature
pub type Signature = [u8; 64];

/// 32-byte digest produced by [`crate::calc_hash`]
pub type PayloadHash = [u8; 32];

/// 32-byte random probe nonce
pub type Nonce = [u8; 32];

pub const ID_LEN: usize = 32;
pub const NONCE_LEN: usize = 32;
pub const HASH_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Size of every encrypted body section
pub const SECTION_SIZE: usize = 4096;

/// Number of sections in a [`crate::DataBody`]
pub const SECTION_COUNT: usize = 4;

/// Body size on the wire: always the same regardless of content
pub const BODY_SIZE: usize = SECTION_SIZE * SECTION_COUNT;

/// Message discriminant carried in the first byte of a relay header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Ping = 0x01,
    Pong = 0x02,
    DataRelay = 0x03,
    Ack = 0x04,
}

impl MessageType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = FlightGuardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageType::Ping),
            0x02 => Ok(MessageType::Pong),
            0x03 => Ok(MessageType::DataRelay),
            0x04 => Ok(MessageType::Ack),
            other => Err(FlightGuardError::InvalidMessageType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_discriminants() {
        assert_eq!(MessageType::Ping.as_byte(), 0x01);
        assert_eq!(MessageType::Pong.as_byte(), 0x02);
        assert_eq!(MessageType::DataRelay.as_byte(), 0x03);
        assert_eq!(MessageType::Ack.as_byte(), 0x04);
    }

    #[test]
    fn test_message_type_from_byte() {
        for t in [
            MessageType::Ping,
            MessageType::Pong,
            MessageType::DataRelay,
            MessageType::Ack,
        ] {
            assert_eq!(MessageType::try_from(t.as_byte()).unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        assert!(matches!(
            MessageType::try_from(0x00),
            Err(FlightGuardError::InvalidMessageType(0x00))
        ));
        assert!(matches!(
            MessageType::try_from(0x05),
            Err(FlightGuardError::InvalidMessageType(0x05))
        ));
    }

    #[test]
    fn test_body_size() {
        assert_eq!(BODY_SIZE, 16384);
    }
}
