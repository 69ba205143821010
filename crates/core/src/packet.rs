//! Packet model
//!
//! Signed probes (Ping/Pong), relay acknowledgments, and the fixed-size
//! `DataPacket` that carries four encrypted sections across relay hops.
//!
//! All multi-byte integers are big-endian. Signing inputs are exactly the
//! `to_bytes()` concatenations below; changing them breaks signature
//! verification between nodes.

use bytes::{Buf, BufMut};
use blake2::{Blake2s256, Digest};

use crate::{
    FlightGuardError, Id, MessageType, Nonce, PayloadHash, Result, Signature, BODY_SIZE,
    HASH_LEN, ID_LEN, NONCE_LEN, SECTION_SIZE, SIGNATURE_LEN,
};

/// Probe wire size: `aircraft_id ‖ nonce ‖ timestamp ‖ signature`
pub const PROBE_WIRE_LEN: usize = ID_LEN + NONCE_LEN + 8 + SIGNATURE_LEN;

/// Ack wire size: `payload_hash ‖ tof_ms ‖ timestamp ‖ signature`
pub const ACK_WIRE_LEN: usize = HASH_LEN + 4 + 8 + SIGNATURE_LEN;

/// One relay path entry on the wire: `identity ‖ hop_number`
pub const PATH_ENTRY_WIRE_LEN: usize = ID_LEN + 2;

/// Fixed part of the relay header: `type ‖ timestamp ‖ payload_hash`
pub const HEADER_FIXED_LEN: usize = 1 + 8 + HASH_LEN;

/// Smallest possible data packet (empty relay path)
pub const DATA_PACKET_MIN_LEN: usize = HEADER_FIXED_LEN + BODY_SIZE;

/// Hop numbers are 16-bit, which bounds the path length
pub const MAX_RELAY_PATH_LEN: usize = u16::MAX as usize;

// =============================================================================
// Ping / Pong
// =============================================================================

/// Signed neighbor-discovery probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub aircraft_id: Id,
    pub nonce: Nonce,
    pub timestamp_utc: u64,
    pub signature: Signature,
}

/// Reply to a [`Ping`]. Same layout; the nonce is echoed back.
pub type Pong = Ping;

impl Ping {
    /// Create an unsigned probe (caller must set `signature`)
    pub fn new(aircraft_id: Id, nonce: Nonce, timestamp_utc: u64) -> Self {
        Self {
            aircraft_id,
            nonce,
            timestamp_utc,
            signature: [0u8; SIGNATURE_LEN],
        }
    }

    /// Signing input: `aircraft_id ‖ nonce ‖ timestamp(8B)`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ID_LEN + NONCE_LEN + 8);
        buf.put_slice(&self.aircraft_id);
        buf.put_slice(&self.nonce);
        buf.put_u64(self.timestamp_utc);
        buf
    }

    /// `to_bytes() ‖ signature`
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = self.to_bytes();
        buf.put_slice(&self.signature);
        buf
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PROBE_WIRE_LEN {
            return Err(FlightGuardError::MalformedPacket(format!(
                "probe must be {} bytes, got {}",
                PROBE_WIRE_LEN,
                bytes.len()
            )));
        }
        let mut buf = bytes;
        let mut aircraft_id = [0u8; ID_LEN];
        buf.copy_to_slice(&mut aircraft_id);
        let mut nonce = [0u8; NONCE_LEN];
        buf.copy_to_slice(&mut nonce);
        let timestamp_utc = buf.get_u64();
        let mut signature = [0u8; SIGNATURE_LEN];
        buf.copy_to_slice(&mut signature);
        Ok(Self {
            aircraft_id,
            nonce,
            timestamp_utc,
            signature,
        })
    }
}

// =============================================================================
// Ack
// =============================================================================

/// Signed acknowledgment of a relayed packet with its time-of-flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub payload_hash: PayloadHash,
    pub time_of_flight_ms: u32,
    pub timestamp_utc: u64,
    pub signature: Signature,
}

impl Ack {
    /// Create an unsigned ack (caller must set `signature`)
    pub fn new(payload_hash: PayloadHash, time_of_flight_ms: u32, timestamp_utc: u64) -> Self {
        Self {
            payload_hash,
            time_of_flight_ms,
            timestamp_utc,
            signature: [0u8; SIGNATURE_LEN],
        }
    }

    /// Signing input: `payload_hash ‖ tof_ms(4B) ‖ timestamp(8B)`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HASH_LEN + 4 + 8);
        buf.put_slice(&self.payload_hash);
        buf.put_u32(self.time_of_flight_ms);
        buf.put_u64(self.timestamp_utc);
        buf
    }

    /// `to_bytes() ‖ signature`
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = self.to_bytes();
        buf.put_slice(&self.signature);
        buf
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ACK_WIRE_LEN {
            return Err(FlightGuardError::MalformedPacket(format!(
                "ack must be {} bytes, got {}",
                ACK_WIRE_LEN,
                bytes.len()
            )));
        }
        let mut buf = bytes;
        let mut payload_hash = [0u8; HASH_LEN];
        buf.copy_to_slice(&mut payload_hash);
        let time_of_flight_ms = buf.get_u32();
        let timestamp_utc = buf.get_u64();
        let mut signature = [0u8; SIGNATURE_LEN];
        buf.copy_to_slice(&mut signature);
        Ok(Self {
            payload_hash,
            time_of_flight_ms,
            timestamp_utc,
            signature,
        })
    }
}

// =============================================================================
// Relay path
// =============================================================================

/// One hop's attestation that it handled the packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPathEntry {
    pub aircraft_id: Id,
    /// 1-based, contiguous along the path
    pub hop_number: u16,
}

// =============================================================================
// Body
// =============================================================================

/// One opaque 4096-byte ciphertext section
pub type Section = Box<[u8; SECTION_SIZE]>;

/// Which of the four body sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Audio,
    Log,
    Decoy1,
    Decoy2,
}

impl SectionKind {
    /// Hashing and wire order
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Audio,
        SectionKind::Log,
        SectionKind::Decoy1,
        SectionKind::Decoy2,
    ];
}

fn zero_section() -> Section {
    Box::new([0u8; SECTION_SIZE])
}

fn section_from_slice(bytes: &[u8]) -> Result<Section> {
    let boxed: Box<[u8]> = bytes.into();
    boxed
        .try_into()
        .map_err(|_| FlightGuardError::SectionSize {
            expected: SECTION_SIZE,
            actual: bytes.len(),
        })
}

/// Four encrypted sections, always present and always exactly
/// [`SECTION_SIZE`] bytes so every packet has the same size on the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBody {
    pub audio_enc: Section,
    pub log_enc: Section,
    pub decoy1_enc: Section,
    pub decoy2_enc: Section,
}

impl Default for DataBody {
    fn default() -> Self {
        Self {
            audio_enc: zero_section(),
            log_enc: zero_section(),
            decoy1_enc: zero_section(),
            decoy2_enc: zero_section(),
        }
    }
}

impl DataBody {
    /// Build from four sections of exactly [`SECTION_SIZE`] bytes each
    pub fn from_sections(audio: &[u8], log: &[u8], decoy1: &[u8], decoy2: &[u8]) -> Result<Self> {
        Ok(Self {
            audio_enc: section_from_slice(audio)?,
            log_enc: section_from_slice(log)?,
            decoy1_enc: section_from_slice(decoy1)?,
            decoy2_enc: section_from_slice(decoy2)?,
        })
    }

    /// Build from up-to-4096-byte sections, zero-padding the short ones
    pub fn padded(audio: &[u8], log: &[u8], decoy1: &[u8], decoy2: &[u8]) -> Result<Self> {
        fn pad(bytes: &[u8]) -> Result<Section> {
            if bytes.len() > SECTION_SIZE {
                return Err(FlightGuardError::SectionSize {
                    expected: SECTION_SIZE,
                    actual: bytes.len(),
                });
            }
            let mut section = zero_section();
            section[..bytes.len()].copy_from_slice(bytes);
            Ok(section)
        }
        Ok(Self {
            audio_enc: pad(audio)?,
            log_enc: pad(log)?,
            decoy1_enc: pad(decoy1)?,
            decoy2_enc: pad(decoy2)?,
        })
    }

    pub fn section(&self, kind: SectionKind) -> &[u8; SECTION_SIZE] {
        match kind {
            SectionKind::Audio => &self.audio_enc,
            SectionKind::Log => &self.log_enc,
            SectionKind::Decoy1 => &self.decoy1_enc,
            SectionKind::Decoy2 => &self.decoy2_enc,
        }
    }

    pub fn section_mut(&mut self, kind: SectionKind) -> &mut [u8; SECTION_SIZE] {
        match kind {
            SectionKind::Audio => &mut self.audio_enc,
            SectionKind::Log => &mut self.log_enc,
            SectionKind::Decoy1 => &mut self.decoy1_enc,
            SectionKind::Decoy2 => &mut self.decoy2_enc,
        }
    }

    /// Sections in fixed order: audio, log, decoy1, decoy2
    pub fn sections(&self) -> [&[u8; SECTION_SIZE]; 4] {
        [
            &self.audio_enc,
            &self.log_enc,
            &self.decoy1_enc,
            &self.decoy2_enc,
        ]
    }
}

// =============================================================================
// Header
// =============================================================================

/// Packet metadata: type, origination time, integrity hash, and hop path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRelayHeader {
    pub message_type: MessageType,
    pub timestamp_utc: u64,
    pub payload_hash: PayloadHash,
    relay_path: Vec<RelayPathEntry>,
}

impl DataRelayHeader {
    pub fn new(message_type: MessageType, timestamp_utc: u64) -> Self {
        Self {
            message_type,
            timestamp_utc,
            payload_hash: [0u8; HASH_LEN],
            relay_path: Vec::new(),
        }
    }

    pub fn relay_path(&self) -> &[RelayPathEntry] {
        &self.relay_path
    }

    /// Append the next hop. Hop numbers are 1-based and contiguous.
    pub fn append_hop(&mut self, aircraft_id: Id) -> Result<u16> {
        let hop_number = u16::try_from(self.relay_path.len() + 1)
            .map_err(|_| FlightGuardError::PathOverflow)?;
        self.relay_path.push(RelayPathEntry {
            aircraft_id,
            hop_number,
        });
        Ok(hop_number)
    }

    /// The most recent hop, i.e. whoever sent us the packet
    pub fn last_hop(&self) -> Option<&RelayPathEntry> {
        self.relay_path.last()
    }
}

/// BLAKE2s-256 over the concatenation of `parts`
pub fn blake2s_digest(parts: &[&[u8]]) -> PayloadHash {
    let mut hasher = Blake2s256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Deterministic integrity hash over a header and body.
///
/// Fed in order: message type, 8-byte timestamp, every path entry as
/// `identity ‖ hop(2B)`, then the four body sections. The stored
/// `payload_hash` itself is never an input. The digest is BLAKE2s-256.
pub fn calc_hash(header: &DataRelayHeader, body: &DataBody) -> PayloadHash {
    calc_hash_with(header, body, blake2s_digest)
}

/// [`calc_hash`] with a caller-supplied digest over the ordered input parts
pub fn calc_hash_with<F>(header: &DataRelayHeader, body: &DataBody, digest: F) -> PayloadHash
where
    F: FnOnce(&[&[u8]]) -> PayloadHash,
{
    hash_with_path(header, header.relay_path(), body, digest)
}

fn hash_with_path<F>(
    header: &DataRelayHeader,
    path: &[RelayPathEntry],
    body: &DataBody,
    digest: F,
) -> PayloadHash
where
    F: FnOnce(&[&[u8]]) -> PayloadHash,
{
    let mut prefix = Vec::with_capacity(1 + 8 + path.len() * PATH_ENTRY_WIRE_LEN);
    prefix.push(header.message_type.as_byte());
    prefix.extend_from_slice(&header.timestamp_utc.to_be_bytes());
    for entry in path {
        prefix.extend_from_slice(&entry.aircraft_id);
        prefix.extend_from_slice(&entry.hop_number.to_be_bytes());
    }

    let [audio, log, decoy1, decoy2] = body.sections();
    let parts: [&[u8]; 5] = [
        prefix.as_slice(),
        audio.as_slice(),
        log.as_slice(),
        decoy1.as_slice(),
        decoy2.as_slice(),
    ];
    digest(&parts[..])
}

// =============================================================================
// DataPacket
// =============================================================================

/// Header plus four fixed-size encrypted sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub header: DataRelayHeader,
    pub body: DataBody,
}

impl DataPacket {
    pub fn new(header: DataRelayHeader, body: DataBody) -> Self {
        Self { header, body }
    }

    /// Originate a DATA_RELAY packet with an empty path and a sealed hash
    pub fn originate(timestamp_utc: u64, body: DataBody) -> Self {
        let mut packet = Self::new(
            DataRelayHeader::new(MessageType::DataRelay, timestamp_utc),
            body,
        );
        packet.seal();
        packet
    }

    pub fn calc_hash(&self) -> PayloadHash {
        calc_hash(&self.header, &self.body)
    }

    pub fn calc_hash_with<F>(&self, digest: F) -> PayloadHash
    where
        F: FnOnce(&[&[u8]]) -> PayloadHash,
    {
        calc_hash_with(&self.header, &self.body, digest)
    }

    /// Store `calc_hash()` as the payload hash. Done once, at origination.
    pub fn seal(&mut self) {
        self.header.payload_hash = self.calc_hash();
    }

    /// Hash of the packet as it left its origin (before any hop was appended)
    pub fn origin_hash(&self) -> PayloadHash {
        self.origin_hash_with(blake2s_digest)
    }

    /// [`DataPacket::origin_hash`] with a caller-supplied digest
    pub fn origin_hash_with<F>(&self, digest: F) -> PayloadHash
    where
        F: FnOnce(&[&[u8]]) -> PayloadHash,
    {
        hash_with_path(&self.header, &[], &self.body, digest)
    }

    /// Whether the stored hash still matches the origin fields and body
    pub fn verify_origin_hash(&self) -> bool {
        self.origin_hash() == self.header.payload_hash
    }

    /// Encode as `header ‖ path entries ‖ body`.
    ///
    /// The path has no count prefix; its length is implied by the datagram size.
    pub fn to_bytes(&self) -> Vec<u8> {
        let path = self.header.relay_path();
        let mut buf =
            Vec::with_capacity(DATA_PACKET_MIN_LEN + path.len() * PATH_ENTRY_WIRE_LEN);
        buf.put_u8(self.header.message_type.as_byte());
        buf.put_u64(self.header.timestamp_utc);
        buf.put_slice(&self.header.payload_hash);
        for entry in path {
            buf.put_slice(&entry.aircraft_id);
            buf.put_u16(entry.hop_number);
        }
        for section in self.body.sections() {
            buf.put_slice(section);
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let path_len = Self::path_len_for(bytes.len()).ok_or_else(|| {
            FlightGuardError::MalformedPacket(format!(
                "{} bytes is not a valid data packet size",
                bytes.len()
            ))
        })?;

        let mut buf = bytes;
        let message_type = MessageType::try_from(buf.get_u8())?;
        let timestamp_utc = buf.get_u64();
        let mut payload_hash = [0u8; HASH_LEN];
        buf.copy_to_slice(&mut payload_hash);

        let mut relay_path = Vec::with_capacity(path_len);
        for i in 0..path_len {
            let mut aircraft_id = [0u8; ID_LEN];
            buf.copy_to_slice(&mut aircraft_id);
            let hop_number = buf.get_u16();
            if usize::from(hop_number) != i + 1 {
                return Err(FlightGuardError::MalformedPacket(format!(
                    "path entry {} has hop number {}",
                    i + 1,
                    hop_number
                )));
            }
            relay_path.push(RelayPathEntry {
                aircraft_id,
                hop_number,
            });
        }

        let (audio, rest) = buf.split_at(SECTION_SIZE);
        let (log, rest) = rest.split_at(SECTION_SIZE);
        let (decoy1, decoy2) = rest.split_at(SECTION_SIZE);
        let body = DataBody::from_sections(audio, log, decoy1, decoy2)?;

        Ok(Self {
            header: DataRelayHeader {
                message_type,
                timestamp_utc,
                payload_hash,
                relay_path,
            },
            body,
        })
    }

    /// Number of path entries a datagram of `len` bytes carries, if valid
    pub fn path_len_for(len: usize) -> Option<usize> {
        let extra = len.checked_sub(DATA_PACKET_MIN_LEN)?;
        if extra % PATH_ENTRY_WIRE_LEN != 0 {
            return None;
        }
        let entries = extra / PATH_ENTRY_WIRE_LEN;
        (entries <= MAX_RELAY_PATH_LEN).then_some(entries)
    }

    pub fn wire_len(&self) -> usize {
        DATA_PACKET_MIN_LEN + self.header.relay_path().len() * PATH_ENTRY_WIRE_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id(n: u8) -> Id {
        [n; 32]
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn zero_packet(timestamp: u64) -> DataPacket {
        DataPacket::originate(timestamp, DataBody::default())
    }

    #[test]
    fn test_wire_sizes() {
        assert_eq!(PROBE_WIRE_LEN, 136);
        assert_eq!(ACK_WIRE_LEN, 108);
        assert_eq!(PATH_ENTRY_WIRE_LEN, 34);
        assert_eq!(DATA_PACKET_MIN_LEN, 16425);
    }

    #[test]
    fn test_ping_signable_layout() {
        let ping = Ping::new(test_id(1), [2u8; 32], 0x0102030405060708);
        let bytes = ping.to_bytes();

        assert_eq!(bytes.len(), 72);
        assert_eq!(&bytes[..32], &[1u8; 32]);
        assert_eq!(&bytes[32..64], &[2u8; 32]);
        assert_eq!(&bytes[64..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_ping_wire_appends_signature() {
        let mut ping = Ping::new(test_id(1), [2u8; 32], 42);
        ping.signature = [9u8; 64];
        let wire = ping.to_wire();

        assert_eq!(wire.len(), PROBE_WIRE_LEN);
        assert_eq!(&wire[..72], ping.to_bytes().as_slice());
        assert_eq!(&wire[72..], &[9u8; 64]);
        assert_eq!(Ping::from_wire(&wire).unwrap(), ping);
    }

    #[test]
    fn test_ping_from_wire_wrong_length() {
        assert!(Ping::from_wire(&[0u8; 135]).is_err());
        assert!(Ping::from_wire(&[0u8; 137]).is_err());
    }

    #[test]
    fn test_ack_signable_layout() {
        let ack = Ack::new([7u8; 32], 6000, 0x0a0b0c0d0e0f1011);
        let bytes = ack.to_bytes();

        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[..32], &[7u8; 32]);
        assert_eq!(&bytes[32..36], &6000u32.to_be_bytes());
        assert_eq!(&bytes[36..], &[0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11]);
    }

    #[test]
    fn test_ack_wire() {
        let mut ack = Ack::new([7u8; 32], 1234, 99);
        ack.signature = [3u8; 64];
        let wire = ack.to_wire();

        assert_eq!(wire.len(), ACK_WIRE_LEN);
        assert_eq!(Ack::from_wire(&wire).unwrap(), ack);
        assert!(Ack::from_wire(&wire[..100]).is_err());
    }

    #[test]
    fn test_default_body_is_zero_and_full_size() {
        let body = DataBody::default();
        for section in body.sections() {
            assert_eq!(section.len(), SECTION_SIZE);
            assert!(section.iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn test_body_from_sections_requires_exact_size() {
        let full = vec![1u8; SECTION_SIZE];
        assert!(DataBody::from_sections(&full, &full, &full, &full).is_ok());

        let short = vec![1u8; 10];
        let err = DataBody::from_sections(&full, &short, &full, &full).unwrap_err();
        assert!(matches!(
            err,
            FlightGuardError::SectionSize {
                expected: SECTION_SIZE,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_body_padded() {
        let body = DataBody::padded(b"audio", b"", b"d1", b"d2").unwrap();
        assert_eq!(&body.audio_enc[..5], b"audio");
        assert!(body.audio_enc[5..].iter().all(|b| *b == 0));
        assert!(body.log_enc.iter().all(|b| *b == 0));
        assert_eq!(body.section(SectionKind::Decoy2)[..2], *b"d2");

        let oversized = vec![0u8; SECTION_SIZE + 1];
        assert!(DataBody::padded(&oversized, b"", b"", b"").is_err());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let packet = zero_packet(1_700_000_000);
        assert_eq!(packet.calc_hash(), packet.calc_hash());
        assert_eq!(packet.calc_hash(), packet.clone().calc_hash());
    }

    #[test]
    fn test_hash_input_order() {
        let packet = zero_packet(1_700_000_000);

        let mut input = vec![0x03u8];
        input.extend_from_slice(&1_700_000_000u64.to_be_bytes());
        input.extend_from_slice(&[0u8; BODY_SIZE]);
        assert_eq!(packet.calc_hash(), blake2s_digest(&[input.as_slice()]));
    }

    #[test]
    fn test_hash_known_vectors() {
        let mut packet = zero_packet(1_700_000_000);
        assert_eq!(
            hex(&packet.calc_hash()),
            "9f3f2ce80f0f1c8b42ae6cd1f4bd6bd725e92de0ee6b52a2fc5277c8a602c729"
        );

        packet.header.append_hop(test_id(0x11)).unwrap();
        assert_eq!(
            hex(&packet.calc_hash()),
            "efa53b995b77fc8745e71351f2e362267942d141419027a8216e146aa96c7e53"
        );
        // The origin hash ignores the appended hop
        assert_eq!(
            hex(&packet.origin_hash()),
            "9f3f2ce80f0f1c8b42ae6cd1f4bd6bd725e92de0ee6b52a2fc5277c8a602c729"
        );
    }

    #[test]
    fn test_blake2s_digest_matches_reference() {
        assert_eq!(
            hex(&blake2s_digest(&[])),
            "69217a3079908094e11121d042354a7c1f55b6482ca1a51e1b250dfd1ed0eef9"
        );
        assert_eq!(
            hex(&blake2s_digest(&[b"a".as_slice(), b"bc".as_slice()])),
            "508c5e8c327c14e2e1a72ba34eeb452f37458b209ed63a294d999b4c86675982"
        );
    }

    #[test]
    fn test_hash_with_custom_digest() {
        let packet = zero_packet(7);
        let mut seen = Vec::new();
        let hash = packet.calc_hash_with(|parts| {
            seen = parts.iter().map(|p| p.len()).collect();
            [0xAB; 32]
        });
        assert_eq!(hash, [0xAB; 32]);
        assert_eq!(seen, vec![9, SECTION_SIZE, SECTION_SIZE, SECTION_SIZE, SECTION_SIZE]);
    }

    #[test]
    fn test_hash_changes_on_any_section_byte() {
        let original = zero_packet(1_700_000_000);
        let reference = original.calc_hash();

        for kind in SectionKind::ALL {
            for index in [0, SECTION_SIZE / 2, SECTION_SIZE - 1] {
                let mut packet = original.clone();
                packet.body.section_mut(kind)[index] ^= 0x01;
                assert_ne!(packet.calc_hash(), reference, "{:?}[{}]", kind, index);
            }
        }
    }

    #[test]
    fn test_hash_covers_header_fields() {
        let packet = zero_packet(100);
        let mut later = packet.clone();
        later.header.timestamp_utc = 101;
        assert_ne!(packet.calc_hash(), later.calc_hash());

        let mut ping_typed = packet.clone();
        ping_typed.header.message_type = MessageType::Ping;
        assert_ne!(packet.calc_hash(), ping_typed.calc_hash());
    }

    #[test]
    fn test_hash_ignores_stored_hash() {
        let mut packet = zero_packet(100);
        let before = packet.calc_hash();
        packet.header.payload_hash = [0xff; 32];
        assert_eq!(packet.calc_hash(), before);
    }

    #[test]
    fn test_hash_covers_relay_path() {
        let mut packet = zero_packet(100);
        let before = packet.calc_hash();
        packet.header.append_hop(test_id(1)).unwrap();
        assert_ne!(packet.calc_hash(), before);
        // The origin view ignores appended hops
        assert_eq!(packet.origin_hash(), before);
    }

    #[test]
    fn test_originate_seals_hash() {
        let packet = zero_packet(100);
        assert_eq!(packet.header.message_type, MessageType::DataRelay);
        assert!(packet.header.relay_path().is_empty());
        assert_eq!(packet.header.payload_hash, packet.calc_hash());
        assert!(packet.verify_origin_hash());
    }

    #[test]
    fn test_verify_origin_hash_detects_body_tamper() {
        let mut packet = zero_packet(100);
        packet.header.append_hop(test_id(1)).unwrap();
        assert!(packet.verify_origin_hash());

        packet.body.log_enc[17] = 0x42;
        assert!(!packet.verify_origin_hash());
    }

    #[test]
    fn test_append_hop_numbers_are_contiguous() {
        let mut header = DataRelayHeader::new(MessageType::DataRelay, 0);
        for n in 1..=5u8 {
            let hop = header.append_hop(test_id(n)).unwrap();
            assert_eq!(hop, n as u16);
        }
        let hops: Vec<u16> = header.relay_path().iter().map(|e| e.hop_number).collect();
        assert_eq!(hops, vec![1, 2, 3, 4, 5]);
        assert_eq!(header.last_hop().unwrap().aircraft_id, test_id(5));
    }

    #[test]
    fn test_append_hop_overflow() {
        let mut header = DataRelayHeader::new(MessageType::DataRelay, 0);
        header.relay_path = vec![
            RelayPathEntry {
                aircraft_id: test_id(0),
                hop_number: 0,
            };
            MAX_RELAY_PATH_LEN
        ];
        assert!(matches!(
            header.append_hop(test_id(1)),
            Err(FlightGuardError::PathOverflow)
        ));
        assert_eq!(header.relay_path().len(), MAX_RELAY_PATH_LEN);
    }

    #[test]
    fn test_data_packet_wire_layout() {
        let mut body = DataBody::default();
        body.audio_enc[0] = 0xaa;
        body.decoy2_enc[SECTION_SIZE - 1] = 0xbb;
        let mut packet = DataPacket::originate(0x1122334455667788, body);
        packet.header.append_hop(test_id(4)).unwrap();
        packet.header.append_hop(test_id(5)).unwrap();

        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), DATA_PACKET_MIN_LEN + 2 * PATH_ENTRY_WIRE_LEN);
        assert_eq!(bytes.len(), packet.wire_len());
        assert_eq!(bytes[0], 0x03);
        assert_eq!(&bytes[1..9], &0x1122334455667788u64.to_be_bytes());
        assert_eq!(&bytes[9..41], &packet.header.payload_hash);
        assert_eq!(&bytes[41..73], &[4u8; 32]);
        assert_eq!(&bytes[73..75], &[0, 1]);
        assert_eq!(&bytes[107..109], &[0, 2]);
        assert_eq!(bytes[109], 0xaa);
        assert_eq!(*bytes.last().unwrap(), 0xbb);

        let decoded = DataPacket::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_data_packet_rejects_unknown_type() {
        let mut bytes = zero_packet(1).to_bytes();
        bytes[0] = 0x09;
        assert!(matches!(
            DataPacket::from_bytes(&bytes),
            Err(FlightGuardError::InvalidMessageType(0x09))
        ));
    }

    #[test]
    fn test_data_packet_rejects_gap_in_path() {
        let mut packet = zero_packet(1);
        packet.header.append_hop(test_id(1)).unwrap();
        packet.header.append_hop(test_id(2)).unwrap();
        let mut bytes = packet.to_bytes();
        // Second entry's hop number: 2 -> 3
        let hop = HEADER_FIXED_LEN + PATH_ENTRY_WIRE_LEN + ID_LEN;
        bytes[hop + 1] = 3;
        assert!(matches!(
            DataPacket::from_bytes(&bytes),
            Err(FlightGuardError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_data_packet_rejects_bad_length() {
        let bytes = zero_packet(1).to_bytes();
        assert!(DataPacket::from_bytes(&bytes[..bytes.len() - 1]).is_err());

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0u8; 10]);
        assert!(DataPacket::from_bytes(&padded).is_err());
    }

    #[test]
    fn test_path_len_for() {
        assert_eq!(DataPacket::path_len_for(DATA_PACKET_MIN_LEN), Some(0));
        assert_eq!(DataPacket::path_len_for(DATA_PACKET_MIN_LEN + 34), Some(1));
        assert_eq!(DataPacket::path_len_for(DATA_PACKET_MIN_LEN + 35), None);
        assert_eq!(DataPacket::path_len_for(100), None);
    }
}
