//! FlightGuard Keystore
//!
//! Identity storage and path utilities shared by FlightGuard binaries.
//!
//! ## Features
//!
//! - Aircraft identity loading/generation (signing + exchange secrets)
//! - Cross-platform path expansion (~, environment variables)
//! - Secure key storage utilities

mod keypair;
mod paths;

pub use keypair::{
    default_key_path, load_identity, load_or_generate_identity, save_identity, KeystoreError,
    IDENTITY_FILE_LEN,
};
pub use paths::{default_config_dir, default_keystore_dir, expand_path};
