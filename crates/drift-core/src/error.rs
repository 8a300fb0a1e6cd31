use thiserror::Error;

pub type DriftResult<T> = Result<T, DriftError>;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("crypto provider error: {0}")]
    CryptoProvider(String),

    #[error("decryption failed: wrong key or corrupted file")]
    AuthenticationFailed,

    #[error("malformed envelope: {len} bytes (minimum 28)")]
    MalformedEnvelope { len: usize },

    #[error("payload is empty")]
    EmptyPayload,

    #[error("payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("part {part_number} response carried no ETag")]
    MissingIntegrityToken { part_number: u32 },

    #[error("download unavailable: {0}")]
    DownloadUnavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("invalid share link or token: {0}")]
    InvalidLink(String),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriftError {
    /// True when the ciphertext could not be authenticated under the given key.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            DriftError::AuthenticationFailed | DriftError::MalformedEnvelope { .. }
        )
    }

    /// True for transport-level failures a user could fix by retrying.
    pub fn is_network(&self) -> bool {
        matches!(self, DriftError::Network(_))
    }
}
