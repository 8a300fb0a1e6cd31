//! HTTP client for the share API
//!
//! Endpoints (relative to `server.api_url`):
//! ```text
//! POST /upload                     multipart form → UploadResponse
//! POST /upload/multipart/init      JSON → MultipartInitResponse
//! PUT  <signed url>                raw part bytes → ETag header
//! POST /upload/multipart/complete  JSON → UploadResponse
//! GET  /download/{token}           ciphertext bytes
//! GET  /download/{token}/info      FileInfo
//! ```

use bytes::Bytes;
use reqwest::{header, multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use drift_core::config::ServerConfig;
use drift_core::types::{
    ErrorBody, FileInfo, MultipartCompleteRequest, MultipartInitRequest, MultipartInitResponse,
    PartResult, UploadResponse,
};
use drift_core::{DriftError, DriftResult};

/// Form fields of a single-shot upload
#[derive(Debug, Clone)]
pub struct SingleUpload {
    pub file_name: String,
    pub envelope: Bytes,
    pub expiration_hours: u32,
    pub download_limit: u32,
    pub key_hex: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(api_url: &str) -> DriftResult<Self> {
        let base = Url::parse(api_url)
            .map_err(|e| DriftError::Config(format!("invalid api url {api_url}: {e}")))?;
        let client = Client::builder()
            .user_agent(concat!("drift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(network)?;
        Ok(Self { base, client })
    }

    /// Build a client from config.
    ///
    /// If `enforce_tls` is true and the endpoint uses HTTP, this returns an error.
    /// Otherwise, a warning is logged for non-HTTPS endpoints.
    pub fn from_config(server: &ServerConfig) -> DriftResult<Self> {
        if server.api_url.starts_with("http://") {
            if server.enforce_tls {
                return Err(DriftError::Config(format!(
                    "api url uses plaintext HTTP ({}), but enforce_tls is enabled. \
                     Use an HTTPS endpoint or set server.enforce_tls = false for local development.",
                    server.api_url
                )));
            }
            tracing::warn!(
                endpoint = %server.api_url,
                "api url uses plaintext HTTP; ciphertext and tokens travel unencrypted"
            );
        }
        Self::new(&server.api_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// `POST /upload` with the whole envelope as the `file` field.
    pub async fn upload_single(&self, upload: SingleUpload) -> DriftResult<UploadResponse> {
        let len = upload.envelope.len() as u64;
        let file = multipart::Part::stream_with_length(upload.envelope, len)
            .file_name(upload.file_name)
            .mime_str("application/octet-stream")
            .map_err(network)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("expiration_hours", upload.expiration_hours.to_string())
            .text("download_limit", upload.download_limit.to_string())
            .text("decryption_key", upload.key_hex);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }

    pub async fn init_multipart(
        &self,
        request: &MultipartInitRequest,
    ) -> DriftResult<MultipartInitResponse> {
        let response = self
            .client
            .post(self.endpoint("upload/multipart/init"))
            .json(request)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }

    /// `PUT` one part to its signed URL and collect the unquoted ETag.
    pub async fn put_part(&self, part_number: u32, url: &str, body: Bytes) -> DriftResult<PartResult> {
        let len = body.len();
        let response = self
            .client
            .put(url)
            .body(body)
            .send()
            .await
            .map_err(network)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let e_tag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(strip_quotes)
            .filter(|t| !t.is_empty())
            .ok_or(DriftError::MissingIntegrityToken { part_number })?;

        tracing::debug!(part_number, bytes = len, "part stored");
        Ok(PartResult { part_number, e_tag })
    }

    pub async fn complete_multipart(
        &self,
        request: &MultipartCompleteRequest,
    ) -> DriftResult<UploadResponse> {
        let response = self
            .client
            .post(self.endpoint("upload/multipart/complete"))
            .json(request)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }

    /// `GET /download/{token}`; the body is left unread for streaming.
    ///
    /// Expired, exhausted and unknown tokens all surface as `DownloadUnavailable`.
    pub async fn download(&self, token: &str) -> DriftResult<Response> {
        let response = self
            .client
            .get(self.endpoint(&format!("download/{token}")))
            .send()
            .await
            .map_err(network)?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriftError::DownloadUnavailable(error_message(&body, status)))
        }
    }

    pub async fn file_info(&self, token: &str) -> DriftResult<FileInfo> {
        let response = self
            .client
            .get(self.endpoint(&format!("download/{token}/info")))
            .send()
            .await
            .map_err(network)?;

        if response.status().is_success() {
            response.json::<FileInfo>().await.map_err(network)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriftError::DownloadUnavailable(error_message(&body, status)))
        }
    }
}

/// Map a transport error; undecodable bodies are the server breaking protocol.
pub(crate) fn network(e: reqwest::Error) -> DriftError {
    if e.is_decode() {
        DriftError::ProtocolViolation(format!("unexpected response body: {e}"))
    } else {
        DriftError::Network(e.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> DriftResult<T> {
    if response.status().is_success() {
        response.json::<T>().await.map_err(network)
    } else {
        Err(rejection(response).await)
    }
}

async fn rejection(response: Response) -> DriftError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    DriftError::ServerRejected {
        status: status.as_u16(),
        message: error_message(&body, status),
    }
}

/// The `error`/`message` field of a JSON error body, else the raw body text.
fn error_message(body: &str, status: StatusCode) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

fn strip_quotes(raw: &str) -> String {
    raw.trim().trim_matches('"').to_string()
}
