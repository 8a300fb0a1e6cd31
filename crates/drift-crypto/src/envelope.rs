//! Whole-file AES-256-GCM encryption/decryption
//!
//! Envelope format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! No associated data: the envelope is the entire uploaded object.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use drift_core::{DriftError, DriftResult};

use crate::keys::EncryptionKey;
use crate::{MIN_ENVELOPE_SIZE, NONCE_SIZE};

/// Envelope size for a plaintext of `plaintext_len` bytes.
pub const fn envelope_len(plaintext_len: usize) -> usize {
    plaintext_len + MIN_ENVELOPE_SIZE
}

/// Encrypt `plaintext` under `key` with a freshly drawn nonce.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> DriftResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| DriftError::CryptoProvider(format!("AES-GCM encryption failed: {e}")))?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// Envelopes shorter than 28 bytes are rejected with `MalformedEnvelope`
/// before any cryptographic work; a failed tag check is `AuthenticationFailed`.
pub fn decrypt(key: &EncryptionKey, envelope: &[u8]) -> DriftResult<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_SIZE {
        return Err(DriftError::MalformedEnvelope {
            len: envelope.len(),
        });
    }

    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher.decrypt(nonce, ciphertext).map_err(|_| {
        tracing::debug!(len = envelope.len(), "envelope failed authentication");
        DriftError::AuthenticationFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{export_hex, generate_key, import_hex};
    use crate::TAG_SIZE;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let plaintext = b"hello, encrypted world!";

        let envelope = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &envelope).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = generate_key();

        let envelope = encrypt(&key, b"").unwrap();
        assert_eq!(envelope.len(), MIN_ENVELOPE_SIZE);
        assert_eq!(decrypt(&key, &envelope).unwrap(), b"");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = generate_key();
        let key2 = generate_key();

        let envelope = encrypt(&key1, b"secret data").unwrap();
        let result = decrypt(&key2, &envelope);

        assert!(matches!(result, Err(DriftError::AuthenticationFailed)));
    }

    #[test]
    fn test_reimported_key_decrypts() {
        let key = generate_key();
        let envelope = encrypt(&key, b"travels in a link").unwrap();

        let reimported = import_hex(&export_hex(&key)).unwrap();
        assert_eq!(decrypt(&reimported, &envelope).unwrap(), b"travels in a link");
    }

    #[test]
    fn test_envelope_size() {
        let key = generate_key();
        let plaintext = vec![0u8; 1000];

        let envelope = encrypt(&key, &plaintext).unwrap();

        // nonce (12) + plaintext (1000) + tag (16) = 1028
        assert_eq!(envelope.len(), NONCE_SIZE + 1000 + TAG_SIZE);
        assert_eq!(envelope.len(), envelope_len(plaintext.len()));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = generate_key();
        let a = encrypt(&key, b"same input").unwrap();
        let b = encrypt(&key, b"same input").unwrap();

        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE], "nonces must not repeat");
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = generate_key();

        let mut envelope = encrypt(&key, b"secret data").unwrap();
        // Flip a byte in the ciphertext (after nonce)
        envelope[NONCE_SIZE + 1] ^= 0xFF;

        assert!(matches!(
            decrypt(&key, &envelope),
            Err(DriftError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_truncated_tag() {
        let key = generate_key();
        let envelope = encrypt(&key, b"0123456789abcdef").unwrap();

        let result = decrypt(&key, &envelope[..envelope.len() - 1]);
        assert!(matches!(result, Err(DriftError::AuthenticationFailed)));
    }

    #[test]
    fn test_short_envelope_rejected() {
        let key = generate_key();
        for len in [0, 1, NONCE_SIZE, MIN_ENVELOPE_SIZE - 1] {
            let result = decrypt(&key, &vec![0u8; len]);
            assert!(
                matches!(result, Err(DriftError::MalformedEnvelope { len: l }) if l == len),
                "{len}-byte envelope must be a format error"
            );
        }
    }

    proptest! {
        #[test]
        fn roundtrip_any_plaintext(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            let key = generate_key();
            let envelope = encrypt(&key, &data).unwrap();
            prop_assert_eq!(envelope.len(), data.len() + NONCE_SIZE + TAG_SIZE);
            prop_assert_eq!(decrypt(&key, &envelope).unwrap(), data);
        }
    }
}
