//! Seal / open of a whole archive under a recipient key pair
//!
//! Envelope format (binary):
//! ```text
//! [4 bytes LE: n][n bytes: RSA-OAEP wrapped key][12 bytes: nonce][ciphertext][16 bytes: GCM tag]
//! ```
//!
//! No additional authenticated data is used. A failed tag check is reported
//! as `Integrity` whether the cause is tampering, a wrong key or corruption.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use packd_core::CryptoError;
use rand::RngCore;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::keys::{check_wrap_capacity, unwrap_key, wrap_key, SymmetricKey};
use crate::{LENGTH_PREFIX_SIZE, NONCE_SIZE, TAG_SIZE};

/// Encrypt `plaintext` for `recipient`.
///
/// The recipient key is checked for capacity before any key material is
/// generated, so an undersized key fails with `KeyTooLarge` and no cipher
/// work is done.
pub fn seal(plaintext: &[u8], recipient: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    check_wrap_capacity(recipient)?;

    let key = SymmetricKey::generate();
    let wrapped = wrap_key(recipient, &key)?;
    let sealed = seal_payload(&key, plaintext)?;

    let wrapped_len = u32::try_from(wrapped.len())
        .map_err(|_| CryptoError::Encrypt("wrapped key exceeds u32 length".into()))?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + wrapped.len() + sealed.len());
    out.extend_from_slice(&wrapped_len.to_le_bytes());
    out.extend_from_slice(&wrapped);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt an envelope produced by `seal`.
pub fn open(envelope: &[u8], recipient: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < LENGTH_PREFIX_SIZE {
        return Err(CryptoError::LengthMismatch {
            declared: LENGTH_PREFIX_SIZE as u64,
            available: envelope.len() as u64,
        });
    }

    let (prefix, rest) = envelope.split_at(LENGTH_PREFIX_SIZE);
    let wrapped_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if wrapped_len > rest.len() {
        return Err(CryptoError::LengthMismatch {
            declared: wrapped_len as u64,
            available: rest.len() as u64,
        });
    }

    let (wrapped, sealed) = rest.split_at(wrapped_len);
    let key = unwrap_key(recipient, wrapped)?;
    open_payload(&key, sealed)
}

/// True if `bytes` is laid out like a sealed envelope: a non-zero wrapped
/// key length that leaves room for a nonce and a tag. Nothing is decrypted.
pub fn is_envelope(bytes: &[u8]) -> bool {
    let Some(prefix) = bytes.get(..LENGTH_PREFIX_SIZE) else {
        return false;
    };
    let wrapped_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    wrapped_len > 0
        && LENGTH_PREFIX_SIZE
            .checked_add(wrapped_len)
            .and_then(|n| n.checked_add(NONCE_SIZE + TAG_SIZE))
            .is_some_and(|needed| needed <= bytes.len())
}

/// AES-256-GCM encrypt with a fresh random nonce.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn seal_payload(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encrypt(format!("AES-256-GCM: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// AES-256-GCM decrypt `[nonce][ciphertext][tag]`.
pub fn open_payload(key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE {
        return Err(CryptoError::LengthMismatch {
            declared: NONCE_SIZE as u64,
            available: sealed.len() as u64,
        });
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Integrity)
}
