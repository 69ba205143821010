//! Aircraft identity
//!
//! A node owns one Ed25519 signing keypair and one independent X25519
//! exchange keypair for its whole lifetime. The certificate is the raw
//! 32-byte verifying key, with no container around it.

use flightguard_core::{Id, PublicKey, Signature};

use crate::keys::{ExchangeKeypair, SigningKeypair};
use crate::sign::{sign_data, verify_signature_slices};

/// Combined identity containing both signing and exchange keys
#[derive(Clone)]
pub struct Identity {
    pub signing: SigningKeypair,
    pub exchange: ExchangeKeypair,
}

impl Identity {
    /// Generate a new random identity
    pub fn generate() -> Self {
        Self {
            signing: SigningKeypair::generate(),
            exchange: ExchangeKeypair::generate(),
        }
    }

    /// Rebuild an identity from its two secrets
    pub fn from_secret_bytes(signing_secret: &[u8; 32], exchange_secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKeypair::from_secret_bytes(signing_secret),
            exchange: ExchangeKeypair::from_secret_bytes(exchange_secret),
        }
    }

    /// Raw public signing key, also used as the aircraft id
    pub fn certificate(&self) -> PublicKey {
        self.signing.public_key_bytes()
    }

    pub fn aircraft_id(&self) -> Id {
        self.certificate()
    }

    /// Public half of the long-term exchange keypair
    pub fn exchange_public(&self) -> PublicKey {
        self.exchange.public_key_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        sign_data(&self.signing, message)
    }

    /// Check `signature` over `message` against a peer certificate.
    ///
    /// Never fails loudly: a malformed certificate, a signature of the wrong
    /// length, or a bad signature all yield `false`.
    pub fn verify_peer(certificate: &[u8], message: &[u8], signature: &[u8]) -> bool {
        // TODO: consult the external trust store for revoked certificates
        verify_signature_slices(certificate, message, signature)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("certificate", &hex::encode(self.certificate()))
            .field("exchange_public", &hex::encode(self.exchange_public()))
            .finish()
    }
}
