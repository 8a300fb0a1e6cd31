//! Wire shapes of the share API and the values the upload flow hands back.

use serde::{Deserialize, Serialize};

/// Response of `POST /upload` and `POST /upload/multipart/complete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Retrieval URL; its last `/download/` segment is the token
    pub url: String,
    #[serde(default)]
    pub message: String,
    pub expires_at: String,
    pub download_limit: u32,
}

/// Body of `POST /upload/multipart/init`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartInitRequest {
    pub filename: String,
    pub file_size: u64,
}

/// One pre-signed part URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartUrl {
    pub part_number: u32,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartInitResponse {
    pub upload_id: String,
    /// Storage object key (not an encryption key)
    pub key: String,
    pub urls: Vec<PartUrl>,
}

/// Integrity token the storage endpoint returned for one part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    pub part_number: u32,
    #[serde(rename = "etag")]
    pub e_tag: String,
}

/// Body of `POST /upload/multipart/complete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartCompleteRequest {
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<PartResult>,
}

/// Response of `GET /download/{token}/info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub expiration_time: String,
    pub download_limit: u32,
    pub download_count: u32,
    pub created_at: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl FileInfo {
    pub fn remaining_downloads(&self) -> u32 {
        self.download_limit.saturating_sub(self.download_count)
    }
}

/// JSON error body returned by the API on failure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What a successful upload yields: the retrieval token and the exported key.
///
/// The key only ever leaves the client embedded in the link from [`ShareReference::link`].
#[derive(Clone, PartialEq, Eq)]
pub struct ShareReference {
    pub token: String,
    pub key_hex: String,
    pub expires_at: String,
    pub download_limit: u32,
}

impl ShareReference {
    /// Render `{share_url}/download/{token}?key={hex}`
    pub fn link(&self, share_url: &str) -> String {
        format!(
            "{}/download/{}?key={}",
            share_url.trim_end_matches('/'),
            self.token,
            self.key_hex
        )
    }
}

impl std::fmt::Debug for ShareReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareReference")
            .field("token", &self.token)
            .field("key_hex", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("download_limit", &self.download_limit)
            .finish()
    }
}
