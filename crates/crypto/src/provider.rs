//! Cryptographic capability
//!
//! Everything the protocol needs from its primitives: key agreement, key
//! derivation, signatures, the section AEAD, and the packet digest. The
//! handshake and the section cipher only reach the primitives through this
//! trait, so tests can drive them with fixed keys and a fake backend.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use flightguard_core::{blake2s_digest, DataPacket, PayloadHash, Signature};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::encrypt::EncryptError;
use crate::identity::Identity;
use crate::keys::{ExchangeKeypair, KeyError};

/// AEAD nonce length, prepended to every sealed message
pub const AEAD_NONCE_LEN: usize = 12;

/// AEAD tag length, appended by [`CryptoProvider::seal`]
pub const AEAD_TAG_LEN: usize = 16;

pub trait CryptoProvider: Send + Sync {
    /// Fresh ephemeral exchange keypair as `(secret, public)`
    fn generate_ephemeral(&self) -> ([u8; 32], [u8; 32]);

    /// Shared secret between our `secret` and their `public`
    fn diffie_hellman(&self, secret: &[u8; 32], public: &[u8; 32]) -> Result<[u8; 32], KeyError>;

    /// Expand a shared secret into a 32-byte session key
    fn derive_session_key(&self, shared: &[u8; 32], context: &[u8]) -> Result<[u8; 32], KeyError>;

    /// Sign `message` with the identity's long-term signing key
    fn sign(&self, identity: &Identity, message: &[u8]) -> Signature;

    /// Signature check that never errors
    fn verify(&self, certificate: &[u8], message: &[u8], signature: &[u8]) -> bool;

    /// Encrypt to `nonce ‖ ciphertext ‖ tag`.
    ///
    /// The output is always `AEAD_NONCE_LEN + plaintext.len() + AEAD_TAG_LEN`
    /// bytes long.
    fn seal(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, EncryptError>;

    /// Reverse of [`CryptoProvider::seal`]
    fn open(&self, key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, EncryptError>;

    /// 256-bit keyless digest over the concatenation of `parts`
    fn digest(&self, parts: &[&[u8]]) -> PayloadHash;

    /// Integrity hash of a packet as it stands, path included
    fn packet_hash(&self, packet: &DataPacket) -> PayloadHash {
        packet.calc_hash_with(|parts| self.digest(parts))
    }

    /// Integrity hash of a packet as it left its origin
    fn origin_hash(&self, packet: &DataPacket) -> PayloadHash {
        packet.origin_hash_with(|parts| self.digest(parts))
    }
}

/// X25519 + HKDF-SHA256 + Ed25519 + ChaCha20-Poly1305 + BLAKE2s
#[derive(Debug, Clone, Copy, Default)]
pub struct DalekProvider;

impl CryptoProvider for DalekProvider {
    fn generate_ephemeral(&self) -> ([u8; 32], [u8; 32]) {
        let ephemeral = ExchangeKeypair::generate();
        (ephemeral.secret_key_bytes(), ephemeral.public_key_bytes())
    }

    fn diffie_hellman(&self, secret: &[u8; 32], public: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        ExchangeKeypair::from_secret_bytes(secret).diffie_hellman(public)
    }

    fn derive_session_key(&self, shared: &[u8; 32], context: &[u8]) -> Result<[u8; 32], KeyError> {
        let hk = Hkdf::<Sha256>::new(None, shared);
        let mut okm = [0u8; 32];
        hk.expand(context, &mut okm)
            .map_err(|_| KeyError::DerivationFailed)?;
        Ok(okm)
    }

    fn sign(&self, identity: &Identity, message: &[u8]) -> Signature {
        identity.sign(message)
    }

    fn verify(&self, certificate: &[u8], message: &[u8], signature: &[u8]) -> bool {
        Identity::verify_peer(certificate, message, signature)
    }

    fn seal(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, EncryptError> {
        let mut nonce_bytes = [0u8; AEAD_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| EncryptError::InvalidKey)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| EncryptError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(AEAD_NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, EncryptError> {
        if sealed.len() < AEAD_NONCE_LEN + AEAD_TAG_LEN {
            return Err(EncryptError::MalformedSection);
        }
        let (nonce, ciphertext) = sealed.split_at(AEAD_NONCE_LEN);
        let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| EncryptError::InvalidKey)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| EncryptError::DecryptionFailed)
    }

    fn digest(&self, parts: &[&[u8]]) -> PayloadHash {
        blake2s_digest(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_keys_are_fresh() {
        let provider = DalekProvider;
        let (s1, p1) = provider.generate_ephemeral();
        let (s2, p2) = provider.generate_ephemeral();
        assert_ne!(s1, s2);
        assert_ne!(p1, p2);
        assert_eq!(ExchangeKeypair::from_secret_bytes(&s1).public_key_bytes(), p1);
    }

    #[test]
    fn test_provider_dh_is_commutative() {
        let provider = DalekProvider;
        let (a_secret, a_public) = provider.generate_ephemeral();
        let (b_secret, b_public) = provider.generate_ephemeral();

        assert_eq!(
            provider.diffie_hellman(&a_secret, &b_public).unwrap(),
            provider.diffie_hellman(&b_secret, &a_public).unwrap()
        );
    }

    #[test]
    fn test_kdf_is_deterministic_and_context_bound() {
        let provider = DalekProvider;
        let shared = [7u8; 32];

        let k1 = provider.derive_session_key(&shared, b"flight-guard-ai").unwrap();
        let k2 = provider.derive_session_key(&shared, b"flight-guard-ai").unwrap();
        let other = provider.derive_session_key(&shared, b"other-context").unwrap();

        assert_eq!(k1, k2);
        assert_ne!(k1, other);
        assert_ne!(k1, shared);
    }

    #[test]
    fn test_kdf_matches_hkdf_sha256_without_salt() {
        let provider = DalekProvider;
        let shared = [1u8; 32];

        let hk = Hkdf::<Sha256>::new(Some(&[0u8; 32][..]), &shared);
        let mut expected = [0u8; 32];
        hk.expand(b"flight-guard-ai", &mut expected).unwrap();

        // An absent salt is a zero-filled hash-length salt (RFC 5869)
        assert_eq!(
            provider.derive_session_key(&shared, b"flight-guard-ai").unwrap(),
            expected
        );
    }

    #[test]
    fn test_provider_sign_verifies_against_certificate() {
        let provider = DalekProvider;
        let identity = Identity::generate();
        let signature = provider.sign(&identity, b"ephemeral");

        assert!(provider.verify(&identity.certificate(), b"ephemeral", &signature));
        assert!(!provider.verify(&identity.certificate(), b"other", &signature));
    }

    #[test]
    fn test_aead_seal_and_open() {
        let provider = DalekProvider;
        let key = [3u8; 32];

        let sealed = provider.seal(&key, b"squawk 7700").unwrap();
        assert_eq!(sealed.len(), AEAD_NONCE_LEN + 11 + AEAD_TAG_LEN);
        assert_eq!(provider.open(&key, &sealed).unwrap(), b"squawk 7700");

        assert!(matches!(
            provider.open(&[4u8; 32], &sealed),
            Err(EncryptError::DecryptionFailed)
        ));
        assert!(matches!(
            provider.open(&key, &sealed[..AEAD_NONCE_LEN]),
            Err(EncryptError::MalformedSection)
        ));
    }

    #[test]
    fn test_digest_is_packet_hash() {
        let provider = DalekProvider;
        let mut packet = DataPacket::originate(1_700_000_000, flightguard_core::DataBody::default());

        assert_eq!(provider.packet_hash(&packet), packet.calc_hash());
        assert_eq!(provider.origin_hash(&packet), packet.header.payload_hash);

        packet.header.append_hop([9u8; 32]).unwrap();
        assert_eq!(provider.packet_hash(&packet), packet.calc_hash());
        assert_eq!(provider.origin_hash(&packet), packet.header.payload_hash);
        assert_eq!(provider.digest(&[b"abc".as_slice()]), blake2s_digest(&[b"abc".as_slice()]));
    }
}
