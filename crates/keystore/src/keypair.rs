//! Identity files
//!
//! An identity file is exactly 64 raw bytes: the Ed25519 signing secret
//! followed by the X25519 exchange secret.

use std::path::{Path, PathBuf};

use flightguard_crypto::Identity;
use thiserror::Error;
use tracing::{debug, info};

use crate::paths::default_keystore_dir;

/// Size of an identity file on disk
pub const IDENTITY_FILE_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("Failed to read identity from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write identity to {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Identity file {path:?} is {actual} bytes, expected 64")]
    InvalidLength { path: PathBuf, actual: usize },
}

/// `~/.flightguard/keys/identity.key`
pub fn default_key_path() -> PathBuf {
    default_keystore_dir().join("identity.key")
}

/// Load an identity file
pub fn load_identity(path: &Path) -> Result<Identity, KeystoreError> {
    let data = std::fs::read(path).map_err(|source| KeystoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if data.len() != IDENTITY_FILE_LEN {
        return Err(KeystoreError::InvalidLength {
            path: path.to_path_buf(),
            actual: data.len(),
        });
    }

    let mut signing = [0u8; 32];
    let mut exchange = [0u8; 32];
    signing.copy_from_slice(&data[..32]);
    exchange.copy_from_slice(&data[32..]);

    debug!("Loaded identity from {:?}", path);
    Ok(Identity::from_secret_bytes(&signing, &exchange))
}

/// Write an identity file, creating parent directories.
///
/// On Unix the file is readable by its owner only.
pub fn save_identity(identity: &Identity, path: &Path) -> Result<(), KeystoreError> {
    let write_err = |source| KeystoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let mut data = Vec::with_capacity(IDENTITY_FILE_LEN);
    data.extend_from_slice(&identity.signing.secret_key_bytes());
    data.extend_from_slice(&identity.exchange.secret_key_bytes());
    std::fs::write(path, &data).map_err(write_err)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(write_err)?;
    }

    info!("Saved identity to {:?}", path);
    Ok(())
}

/// Load the identity at `path`, generating and saving a new one if absent.
///
/// A file that exists but is malformed is an error, never overwritten.
pub fn load_or_generate_identity(path: &Path) -> Result<Identity, KeystoreError> {
    if path.exists() {
        return load_identity(path);
    }

    let identity = Identity::generate();
    save_identity(&identity, path)?;
    info!("Generated new identity at {:?}", path);
    Ok(identity)
}
