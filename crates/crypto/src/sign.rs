use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier, VerifyingKey};
use flightguard_core::{Ack, Id, Nonce, PayloadHash, Ping, Pong, PublicKey, Signature};

use crate::identity::Identity;
use crate::keys::SigningKeypair;

/// Sign data with a signing keypair
pub fn sign_data(keypair: &SigningKeypair, data: &[u8]) -> Signature {
    let signature: Ed25519Signature = keypair.signing_key.sign(data);
    signature.to_bytes()
}

/// Verify a signature
pub fn verify_signature(pubkey: &PublicKey, data: &[u8], signature: &Signature) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(pubkey) {
        Ok(vk) => vk,
        Err(_) => return false,
    };

    let signature = Ed25519Signature::from_bytes(signature);

    verifying_key.verify(data, &signature).is_ok()
}

/// Verify a signature given as untrusted slices of any length
pub fn verify_signature_slices(pubkey: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let (Ok(pubkey), Ok(signature)) = (
        <&PublicKey>::try_from(pubkey),
        <&Signature>::try_from(signature),
    ) else {
        return false;
    };
    verify_signature(pubkey, data, signature)
}

/// Build and sign a probe from this node
pub fn sign_ping(identity: &Identity, nonce: Nonce, timestamp_utc: u64) -> Ping {
    let mut ping = Ping::new(identity.aircraft_id(), nonce, timestamp_utc);
    ping.signature = identity.sign(&ping.to_bytes());
    ping
}

/// Answer a probe: same nonce, our id, our clock
pub fn sign_pong(identity: &Identity, ping: &Ping, timestamp_utc: u64) -> Pong {
    sign_ping(identity, ping.nonce, timestamp_utc)
}

/// Verify a probe against the certificate it names
pub fn verify_ping(ping: &Ping) -> bool {
    verify_signature(&ping.aircraft_id, &ping.to_bytes(), &ping.signature)
}

/// Build and sign an acknowledgment for a relayed packet
pub fn sign_ack(
    identity: &Identity,
    payload_hash: PayloadHash,
    time_of_flight_ms: u32,
    timestamp_utc: u64,
) -> Ack {
    let mut ack = Ack::new(payload_hash, time_of_flight_ms, timestamp_utc);
    ack.signature = identity.sign(&ack.to_bytes());
    ack
}

/// Verify an ack against the certificate of the node believed to have sent it
pub fn verify_ack(ack: &Ack, certificate: &Id) -> bool {
    verify_signature(certificate, &ack.to_bytes(), &ack.signature)
}
