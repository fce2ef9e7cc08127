//! Opaque encryption key forwarded to storage collaborators
//!
//! Tessera never encrypts anything itself. The key is validated for shape and
//! then handed unmodified to whatever reads or writes the array's files.

use crate::error::{TesseraError, TesseraResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in bytes of an AES-256-GCM key
pub const AES_256_GCM_KEY_LEN: usize = 32;

/// Cipher applied to the array's on-disk data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncryptionType {
    /// Plaintext storage
    #[default]
    NoEncryption,
    /// AES-256 in Galois/Counter mode
    Aes256Gcm,
}

/// Encryption type plus raw key material
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncryptionKey {
    encryption_type: EncryptionType,
    key: Vec<u8>,
}

impl EncryptionKey {
    /// Build a key, checking that its length matches the cipher
    pub fn new(encryption_type: EncryptionType, key: &[u8]) -> TesseraResult<Self> {
        match encryption_type {
            EncryptionType::NoEncryption if !key.is_empty() => {
                return Err(TesseraError::validation(
                    "Invalid encryption key; a key must not be given without an encryption type.",
                ));
            }
            EncryptionType::Aes256Gcm if key.len() != AES_256_GCM_KEY_LEN => {
                return Err(TesseraError::validation(format!(
                    "Invalid encryption key; AES-256-GCM requires {} bytes, got {}.",
                    AES_256_GCM_KEY_LEN,
                    key.len()
                )));
            }
            _ => {}
        }
        Ok(EncryptionKey {
            encryption_type,
            key: key.to_vec(),
        })
    }

    /// The no-encryption key
    pub fn none() -> Self {
        EncryptionKey::default()
    }

    /// Cipher this key is for
    pub fn encryption_type(&self) -> EncryptionType {
        self.encryption_type
    }

    /// Raw key bytes
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

// Key bytes stay out of logs.
impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("encryption_type", &self.encryption_type)
            .field("key_len", &self.key.len())
            .finish()
    }
}
