//! drift-crypto: client-side encryption for shared files
//!
//! A file is sealed whole under a fresh per-share key:
//!
//! ```text
//! EncryptionKey (256-bit, random, exported as 64 lowercase hex chars)
//!   └── Envelope: [12-byte random nonce][AES-256-GCM ciphertext][16-byte tag]
//! ```
//!
//! The key never reaches the server; it travels only inside the share link.

pub mod envelope;
pub mod keys;

pub use envelope::{decrypt, encrypt, envelope_len};
pub use keys::{export_hex, generate_key, import_hex, EncryptionKey};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag (128-bit)
pub const TAG_SIZE: usize = 16;

/// Smallest well-formed envelope: nonce plus tag over an empty plaintext
pub const MIN_ENVELOPE_SIZE: usize = NONCE_SIZE + TAG_SIZE;
