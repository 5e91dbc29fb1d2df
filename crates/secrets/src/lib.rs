//! File-backed persistence for provider API keys.
//!
//! The file holds `{"version": 1, "secrets": {...}}`, or
//! `{"version": 1, "nonce": ..., "ciphertext": ...}` when an encryption key
//! (`PAPERTRADE_SECRET_KEY`) is configured.

mod errors;
mod file_store;

pub use errors::{Result, SecretsError};
pub use file_store::FileCredentialStore;
