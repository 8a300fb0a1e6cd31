//! Key generation and the hex transport form of a key

use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use drift_core::{DriftError, DriftResult};

use crate::KEY_SIZE;

/// A 256-bit AES-GCM key usable for both encryption and decryption. Zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl std::str::FromStr for EncryptionKey {
    type Err = DriftError;

    fn from_str(s: &str) -> DriftResult<Self> {
        import_hex(s)
    }
}

/// Generate a random 256-bit key.
pub fn generate_key() -> EncryptionKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    EncryptionKey::from_bytes(bytes)
}

/// Raw key bytes as lowercase hex (64 characters).
pub fn export_hex(key: &EncryptionKey) -> String {
    hex::encode(key.as_bytes())
}

/// Parse a hex-encoded key.
///
/// Fails with `InvalidKeyFormat` on odd length, non-hex characters, or a
/// decoded length other than 32 bytes. Surrounding whitespace is ignored.
pub fn import_hex(encoded: &str) -> DriftResult<EncryptionKey> {
    let encoded = encoded.trim();
    let decoded = Zeroizing::new(hex::decode(encoded).map_err(|e| match e {
        hex::FromHexError::OddLength => {
            DriftError::InvalidKeyFormat(format!("odd hex length {}", encoded.len()))
        }
        hex::FromHexError::InvalidHexCharacter { c, index } => {
            DriftError::InvalidKeyFormat(format!("non-hex character {c:?} at {index}"))
        }
        other => DriftError::InvalidKeyFormat(other.to_string()),
    })?);

    if decoded.len() != KEY_SIZE {
        return Err(DriftError::InvalidKeyFormat(format!(
            "key is {} bytes (expected {KEY_SIZE})",
            decoded.len()
        )));
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&decoded);
    Ok(EncryptionKey::from_bytes(bytes))
}
