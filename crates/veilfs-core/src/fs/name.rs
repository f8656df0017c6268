//! Filename cipher boundary and the AES-SIV implementation behind it.
//!
//! Logical path segments never appear on physical storage; every child entry
//! name goes through a [`FilenameCipher`] on the way down and back up. The
//! cipher sees one segment at a time and must satisfy
//! `decrypt_segment(encrypt_segment(x)) == x` for every valid segment.

use aes_siv::{siv::Aes256Siv, KeyInit};
use base64::{engine::general_purpose, Engine as _};
use generic_array::GenericArray;
use std::fmt;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

/// Context for filename operations, carried in error messages.
#[derive(Debug, Clone, Default)]
pub struct NameContext {
    /// The encrypted segment (if available).
    pub encrypted_name: Option<String>,
    /// The cleartext segment (if available, e.g. during encryption).
    pub cleartext_name: Option<String>,
}

impl NameContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encrypted_name(mut self, name: impl Into<String>) -> Self {
        self.encrypted_name = Some(name.into());
        self
    }

    pub fn with_cleartext_name(mut self, name: impl Into<String>) -> Self {
        self.cleartext_name = Some(name.into());
        self
    }
}

impl fmt::Display for NameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref name) = self.cleartext_name {
            write!(f, "segment '{name}'")
        } else if let Some(ref enc) = self.encrypted_name {
            // Truncate long encrypted names for readability
            if enc.len() > 40 {
                write!(f, "encrypted segment '{}...'", &enc[..37])
            } else {
                write!(f, "encrypted segment '{enc}'")
            }
        } else {
            write!(f, "(no context)")
        }
    }
}

/// Errors from segment encryption/decryption.
///
/// Decryption failures indicate integrity violations: AES-SIV is
/// authenticated, so a failed decrypt means the ciphertext was tampered with
/// or the wrong key was used.
#[derive(Error, Debug)]
pub enum NameError {
    /// AES-SIV decryption failed; the ciphertext is invalid or tampered.
    #[error("failed to decrypt {context}: authentication failed - possible tampering or wrong key")]
    DecryptionFailed { context: NameContext },

    /// The base64-encoded portion of the segment is malformed.
    #[error("invalid base64 encoding for {context}: {reason}")]
    Base64Decode { reason: String, context: NameContext },

    /// The decrypted bytes are not valid UTF-8.
    #[error("invalid UTF-8 after decryption for {context}: {reason}")]
    Utf8Decode { reason: String, context: NameContext },

    /// Encryption failed unexpectedly; AES-SIV does not fail on valid input.
    #[error("unexpected encryption failure for {context}")]
    EncryptionFailed { context: NameContext },
}

/// Bidirectional mapping between a cleartext path segment and its encrypted
/// on-disk representation.
///
/// Implementations must be deterministic: the same segment always maps to the
/// same ciphertext, so directory listings remain stable across calls.
pub trait FilenameCipher: Send + Sync {
    fn encrypt_segment(&self, plaintext: &str) -> Result<String, NameError>;
    fn decrypt_segment(&self, ciphertext: &str) -> Result<String, NameError>;
}

/// AES-SIV-256 segment cipher producing base64url ciphertexts.
///
/// Segments are NFC-normalized before encryption so the same logical name
/// maps to the same ciphertext regardless of the platform's Unicode form
/// (macOS produces NFD, Linux and Windows NFC).
pub struct SivFilenameCipher {
    key: Zeroizing<[u8; 64]>,
}

impl SivFilenameCipher {
    /// Create a cipher from 64 key bytes (MAC key followed by encryption key).
    pub fn new(key: [u8; 64]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    fn cipher(&self) -> Aes256Siv {
        Aes256Siv::new(GenericArray::from_slice(&self.key[..]))
    }
}

impl FilenameCipher for SivFilenameCipher {
    fn encrypt_segment(&self, plaintext: &str) -> Result<String, NameError> {
        let context = NameContext::new().with_cleartext_name(plaintext);

        let normalized: String = plaintext.nfc().collect();

        let associated_data: &[&[u8]] = &[];
        let encrypted = self
            .cipher()
            .encrypt(associated_data, normalized.as_bytes())
            .map_err(|_| NameError::EncryptionFailed {
                context: context.clone(),
            })?;

        Ok(general_purpose::URL_SAFE.encode(&encrypted))
    }

    fn decrypt_segment(&self, ciphertext: &str) -> Result<String, NameError> {
        let context = NameContext::new().with_encrypted_name(ciphertext);

        // Accept both padded and unpadded base64url so trees written by
        // other implementations remain readable.
        let decoded = general_purpose::URL_SAFE
            .decode(ciphertext.as_bytes())
            .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(ciphertext.as_bytes()))
            .map_err(|e| NameError::Base64Decode {
                reason: e.to_string(),
                context: context.clone(),
            })?;

        let associated_data: &[&[u8]] = &[];
        let decrypted = self
            .cipher()
            .decrypt(associated_data, &decoded)
            .map_err(|_| NameError::DecryptionFailed {
                context: context.clone(),
            })?;

        String::from_utf8(decrypted).map_err(|e| NameError::Utf8Decode {
            reason: e.to_string(),
            context: context.clone(),
        })
    }
}

impl fmt::Debug for SivFilenameCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SivFilenameCipher").finish_non_exhaustive()
    }
}
