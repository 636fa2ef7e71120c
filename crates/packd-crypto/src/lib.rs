//! packd-crypto: hybrid encryption envelope for whole archives
//!
//! Architecture: fresh per-archive AES-256 key, wrapped for one recipient
//!
//! Pipeline: plaintext archive → AES-256-GCM (random 96-bit nonce) → prepend
//! RSA-OAEP(SHA-256)-wrapped key
//!
//! Envelope layout:
//! ```text
//! [4 bytes LE: wrapped key length][wrapped key][12-byte nonce][ciphertext][16-byte tag]
//! ```
//!
//! The asymmetric key only ever protects the 32-byte symmetric key; the
//! archive itself can be any size.

pub mod envelope;
pub mod keys;

pub use envelope::{is_envelope, open, open_payload, seal, seal_payload};
pub use keys::{
    check_wrap_capacity, generate_key_pair, load_private_key, load_public_key,
    max_wrap_payload, parse_private_key_pem, parse_public_key_pem, unwrap_key, wrap_key,
    write_key_pair, SymmetricKey,
};
pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// Size of the per-archive symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Output size of SHA-256, the OAEP hash
pub const HASH_SIZE: usize = 32;

/// Width of the little-endian wrapped-key length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Smallest modulus `generate_key_pair` will produce
pub const MIN_KEYGEN_BITS: usize = 2048;
