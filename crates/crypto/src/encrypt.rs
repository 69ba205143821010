//! Fixed-size section cipher
//!
//! Every body section is exactly 4096 bytes on the air, whatever it holds:
//! `nonce(12) ‖ ChaCha20-Poly1305(len(2) ‖ plaintext ‖ zero padding) ‖ tag(16)`.
//! Decoys are random bytes of the same size and cannot be told apart from
//! real sections without the session key.

use flightguard_core::{DataBody, Section, SECTION_SIZE};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::provider::{CryptoProvider, DalekProvider, AEAD_NONCE_LEN, AEAD_TAG_LEN};

const LEN_PREFIX: usize = 2;

/// Padded plaintext length inside a section
const FRAME_LEN: usize = SECTION_SIZE - AEAD_NONCE_LEN - AEAD_TAG_LEN;

/// Largest plaintext a single section can carry
pub const SECTION_CAPACITY: usize = FRAME_LEN - LEN_PREFIX;

#[derive(Error, Debug)]
pub enum EncryptError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid key")]
    InvalidKey,
    #[error("Plaintext too large: max {max}, got {actual}")]
    PlaintextTooLarge { max: usize, actual: usize },
    #[error("Malformed section")]
    MalformedSection,
}

/// Seal a plaintext into one full-size section
pub fn seal_section(key: &[u8; 32], plaintext: &[u8]) -> Result<Section, EncryptError> {
    seal_section_with(&DalekProvider, key, plaintext)
}

/// [`seal_section`] through a specific provider's AEAD
pub fn seal_section_with<P: CryptoProvider + ?Sized>(
    provider: &P,
    key: &[u8; 32],
    plaintext: &[u8],
) -> Result<Section, EncryptError> {
    if plaintext.len() > SECTION_CAPACITY {
        return Err(EncryptError::PlaintextTooLarge {
            max: SECTION_CAPACITY,
            actual: plaintext.len(),
        });
    }

    let mut frame = vec![0u8; FRAME_LEN];
    frame[..LEN_PREFIX].copy_from_slice(&(plaintext.len() as u16).to_be_bytes());
    frame[LEN_PREFIX..LEN_PREFIX + plaintext.len()].copy_from_slice(plaintext);

    let sealed = provider.seal(key, &frame)?;
    if sealed.len() != SECTION_SIZE {
        return Err(EncryptError::EncryptionFailed);
    }

    let mut section = Box::new([0u8; SECTION_SIZE]);
    section.copy_from_slice(&sealed);
    Ok(section)
}

/// Open a section sealed with [`seal_section`]
pub fn open_section(key: &[u8; 32], section: &[u8; SECTION_SIZE]) -> Result<Vec<u8>, EncryptError> {
    open_section_with(&DalekProvider, key, section)
}

/// [`open_section`] through a specific provider's AEAD
pub fn open_section_with<P: CryptoProvider + ?Sized>(
    provider: &P,
    key: &[u8; 32],
    section: &[u8; SECTION_SIZE],
) -> Result<Vec<u8>, EncryptError> {
    let frame = provider.open(key, section.as_slice())?;
    if frame.len() != FRAME_LEN {
        return Err(EncryptError::MalformedSection);
    }

    let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    if len > SECTION_CAPACITY {
        return Err(EncryptError::MalformedSection);
    }
    Ok(frame[LEN_PREFIX..LEN_PREFIX + len].to_vec())
}

/// A section of random bytes
pub fn decoy_section() -> Section {
    let mut section = Box::new([0u8; SECTION_SIZE]);
    OsRng.fill_bytes(section.as_mut_slice());
    section
}

/// Seal audio and log payloads and fill both decoys
pub fn seal_body(key: &[u8; 32], audio: &[u8], log: &[u8]) -> Result<DataBody, EncryptError> {
    seal_body_with(&DalekProvider, key, audio, log)
}

pub fn seal_body_with<P: CryptoProvider + ?Sized>(
    provider: &P,
    key: &[u8; 32],
    audio: &[u8],
    log: &[u8],
) -> Result<DataBody, EncryptError> {
    Ok(DataBody {
        audio_enc: seal_section_with(provider, key, audio)?,
        log_enc: seal_section_with(provider, key, log)?,
        decoy1_enc: decoy_section(),
        decoy2_enc: decoy_section(),
    })
}

/// Recover `(audio, log)` from a sealed body
pub fn open_body(key: &[u8; 32], body: &DataBody) -> Result<(Vec<u8>, Vec<u8>), EncryptError> {
    open_body_with(&DalekProvider, key, body)
}

pub fn open_body_with<P: CryptoProvider + ?Sized>(
    provider: &P,
    key: &[u8; 32],
    body: &DataBody,
) -> Result<(Vec<u8>, Vec<u8>), EncryptError> {
    Ok((
        open_section_with(provider, key, &body.audio_enc)?,
        open_section_with(provider, key, &body.log_enc)?,
    ))
}
