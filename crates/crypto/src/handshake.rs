//! Authenticated key exchange
//!
//! A one-shot ephemeral-static X25519 exchange in the spirit of Noise IK.
//! The initiator generates an ephemeral key, combines it with the
//! responder's long-term exchange key, and signs the ephemeral public key
//! with its long-term signing key. The responder checks that signature
//! against the initiator's certificate before doing any key agreement.
//!
//! Only the initiator is authenticated. The responder proves nothing back
//! within this exchange; a mutual variant needs a return signature.

use flightguard_core::{FlightGuardError, Signature, SIGNATURE_LEN};
use thiserror::Error;
use tracing::{trace, warn};

use crate::identity::Identity;
use crate::keys::{key_from_slice, KeyError};
use crate::provider::{CryptoProvider, DalekProvider};

/// KDF info string for session keys
pub const HANDSHAKE_CONTEXT: &[u8] = b"flight-guard-ai";

/// Session key length, matching ChaCha20-Poly1305
pub const SESSION_KEY_LEN: usize = 32;

/// Bytes sent to the responder: `ephemeral_public ‖ signature`
pub const HANDSHAKE_INIT_LEN: usize = 32 + SIGNATURE_LEN;

pub type SessionKey = [u8; SESSION_KEY_LEN];

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("Invalid peer key")]
    InvalidPeerKey,
    #[error("Handshake authentication failed")]
    AuthenticationFailed,
    #[error("Session key derivation failed")]
    KeyDerivation,
}

impl From<KeyError> for HandshakeError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::InvalidPublicKey => HandshakeError::InvalidPeerKey,
            KeyError::DerivationFailed => HandshakeError::KeyDerivation,
        }
    }
}

impl From<HandshakeError> for FlightGuardError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::InvalidPeerKey => FlightGuardError::InvalidPeerKey,
            HandshakeError::AuthenticationFailed => FlightGuardError::HandshakeAuthenticationFailed,
            HandshakeError::KeyDerivation => {
                FlightGuardError::MalformedPacket("session key derivation failed".to_string())
            }
        }
    }
}

/// Initiator progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    Start,
    EphemeralGenerated,
    SharedComputed,
    SessionDerived,
}

/// Responder progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    Received,
    Verified,
    Rejected,
    SharedComputed,
    SessionDerived,
}

/// Outcome of the initiator's side
///
/// `ephemeral_public` and `signature` go to the peer; the session key is
/// handed to the cipher layer and never leaves this node.
#[derive(Clone)]
pub struct HandshakeResult {
    pub session_key: SessionKey,
    pub ephemeral_public: [u8; 32],
    pub signature: Signature,
}

impl HandshakeResult {
    /// The part of the result that is transmitted
    pub fn init_message(&self) -> HandshakeInit {
        HandshakeInit {
            ephemeral_public: self.ephemeral_public,
            signature: self.signature,
        }
    }
}

impl std::fmt::Debug for HandshakeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeResult")
            .field("ephemeral_public", &hex::encode(self.ephemeral_public))
            .finish_non_exhaustive()
    }
}

/// Handshake message on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInit {
    pub ephemeral_public: [u8; 32],
    pub signature: Signature,
}

impl HandshakeInit {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HANDSHAKE_INIT_LEN);
        data.extend_from_slice(&self.ephemeral_public);
        data.extend_from_slice(&self.signature);
        data
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HandshakeError> {
        if bytes.len() != HANDSHAKE_INIT_LEN {
            return Err(HandshakeError::InvalidPeerKey);
        }
        let (ephemeral, signature) = bytes.split_at(32);
        Ok(Self {
            ephemeral_public: key_from_slice(ephemeral)?,
            signature: signature
                .try_into()
                .map_err(|_| HandshakeError::AuthenticationFailed)?,
        })
    }
}

/// Handshake driver over a cryptographic provider
#[derive(Debug, Clone, Default)]
pub struct Handshake<P: CryptoProvider = DalekProvider> {
    provider: P,
}

impl Handshake<DalekProvider> {
    pub fn new() -> Self {
        Self {
            provider: DalekProvider,
        }
    }
}

impl<P: CryptoProvider> Handshake<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    /// Start a handshake toward the owner of `peer_exchange_public`.
    pub fn initiate(
        &self,
        identity: &Identity,
        peer_exchange_public: &[u8],
    ) -> Result<HandshakeResult, HandshakeError> {
        let mut state = InitiatorState::Start;
        trace!(?state, "handshake initiator");

        let peer_public =
            key_from_slice(peer_exchange_public).map_err(|_| HandshakeError::InvalidPeerKey)?;

        let (ephemeral_secret, ephemeral_public) = self.provider.generate_ephemeral();
        state = InitiatorState::EphemeralGenerated;
        trace!(?state, "handshake initiator");

        let shared = self
            .provider
            .diffie_hellman(&ephemeral_secret, &peer_public)?;
        state = InitiatorState::SharedComputed;
        trace!(?state, "handshake initiator");

        let session_key = self
            .provider
            .derive_session_key(&shared, HANDSHAKE_CONTEXT)?;
        let signature = self.provider.sign(identity, &ephemeral_public);
        state = InitiatorState::SessionDerived;
        trace!(?state, "handshake initiator");

        Ok(HandshakeResult {
            session_key,
            ephemeral_public,
            signature,
        })
    }

    /// Answer a handshake from the holder of `peer_certificate`.
    ///
    /// The signature is checked before the ephemeral key is touched; a
    /// rejected handshake produces no key material at all.
    pub fn respond(
        &self,
        identity: &Identity,
        peer_ephemeral_public: &[u8],
        signature: &[u8],
        peer_certificate: &[u8],
    ) -> Result<SessionKey, HandshakeError> {
        let mut state = ResponderState::Received;
        trace!(?state, "handshake responder");

        if !self
            .provider
            .verify(peer_certificate, peer_ephemeral_public, signature)
        {
            state = ResponderState::Rejected;
            warn!(
                ?state,
                peer = %hex::encode(&peer_certificate[..peer_certificate.len().min(4)]),
                "Handshake signature rejected"
            );
            return Err(HandshakeError::AuthenticationFailed);
        }
        state = ResponderState::Verified;
        trace!(?state, "handshake responder");

        let peer_ephemeral =
            key_from_slice(peer_ephemeral_public).map_err(|_| HandshakeError::InvalidPeerKey)?;
        let shared = self
            .provider
            .diffie_hellman(&identity.exchange.secret_key_bytes(), &peer_ephemeral)?;
        state = ResponderState::SharedComputed;
        trace!(?state, "handshake responder");

        let session_key = self
            .provider
            .derive_session_key(&shared, HANDSHAKE_CONTEXT)?;
        state = ResponderState::SessionDerived;
        trace!(?state, "handshake responder");

        Ok(session_key)
    }

    /// [`Handshake::respond`] for a received [`HandshakeInit`]
    pub fn respond_to(
        &self,
        identity: &Identity,
        init: &HandshakeInit,
        peer_certificate: &[u8],
    ) -> Result<SessionKey, HandshakeError> {
        self.respond(
            identity,
            &init.ephemeral_public,
            &init.signature,
            peer_certificate,
        )
    }
}

/// Initiate with the default provider
pub fn initiate_handshake(
    identity: &Identity,
    peer_exchange_public: &[u8],
) -> Result<HandshakeResult, HandshakeError> {
    Handshake::new().initiate(identity, peer_exchange_public)
}

/// Respond with the default provider
pub fn respond_handshake(
    identity: &Identity,
    peer_ephemeral_public: &[u8],
    signature: &[u8],
    peer_certificate: &[u8],
) -> Result<SessionKey, HandshakeError> {
    Handshake::new().respond(identity, peer_ephemeral_public, signature, peer_certificate)
}
