//! Upload orchestration
//!
//! One attempt runs: encrypt → plan → (single-shot | init → parallel part
//! PUTs → complete) → `ShareReference`. Any failure aborts the attempt and
//! leaves the session in `Failed` with progress reset. Nothing is retried.

use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use drift_chunks::{PartSpan, UploadPlan};
use drift_core::config::UploadConfig;
use drift_core::types::{
    MultipartCompleteRequest, MultipartInitRequest, PartResult, PartUrl, ShareReference,
    UploadResponse,
};
use drift_core::{DriftError, DriftResult, PART_SIZE};
use drift_crypto::EncryptionKey;

use crate::api::{ApiClient, SingleUpload};
use crate::link::normalize_token;
use crate::session::{cancellable, UploadSession, UploadState};

/// What to upload and the server-side retention it should get.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub data: Vec<u8>,
    pub expiration_hours: u32,
    pub download_limit: u32,
    /// Allow the multipart path for payloads of at least one part
    pub multipart: bool,
}

impl UploadRequest {
    /// A request with the default retention: 24 hours, one download, multipart allowed.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
            expiration_hours: 24,
            download_limit: 1,
            multipart: true,
        }
    }

    /// Apply `[upload]` defaults from config.
    pub fn with_config(mut self, upload: &UploadConfig) -> Self {
        self.expiration_hours = upload.expiration_hours;
        self.download_limit = upload.download_limit;
        self.multipart = upload.multipart;
        self
    }

    pub fn expiration_hours(mut self, hours: u32) -> Self {
        self.expiration_hours = hours;
        self
    }

    pub fn download_limit(mut self, limit: u32) -> Self {
        self.download_limit = limit;
        self
    }

    pub fn multipart(mut self, enabled: bool) -> Self {
        self.multipart = enabled;
        self
    }
}

/// A planned part bound to the URL the server signed for it
#[derive(Debug, Clone)]
struct SignedPart {
    span: PartSpan,
    url: String,
}

#[derive(Debug, Clone)]
pub struct UploadOrchestrator {
    api: ApiClient,
    progress_tick: Duration,
    part_size: u64,
}

impl UploadOrchestrator {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            progress_tick: Duration::from_millis(300),
            part_size: PART_SIZE,
        }
    }

    /// Cadence of the estimated progress emitted during a single-shot upload.
    pub fn with_progress_tick(mut self, tick: Duration) -> Self {
        self.progress_tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Override the 10 MiB part size.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    /// Encrypt `request.data` under a fresh key and upload the envelope.
    ///
    /// On success the session is `Done` at 100%. On failure it is `Failed`
    /// with progress reset, and the error is returned unchanged.
    pub async fn upload(
        &self,
        session: &mut UploadSession,
        request: UploadRequest,
    ) -> DriftResult<ShareReference> {
        match self.run(session, request).await {
            Ok(share) => Ok(share),
            Err(e) => {
                warn!(error = %e, state = ?session.state(), "upload failed");
                session.fail();
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        session: &mut UploadSession,
        request: UploadRequest,
    ) -> DriftResult<ShareReference> {
        let UploadRequest {
            file_name,
            data,
            expiration_hours,
            download_limit,
            multipart,
        } = request;

        session.transition(UploadState::Encrypting)?;
        if data.is_empty() {
            return Err(DriftError::EmptyPayload);
        }
        session.check_cancelled()?;

        let key = drift_crypto::generate_key();
        let key_hex = drift_crypto::export_hex(&key);
        let plaintext_len = data.len();
        let envelope = encrypt_blocking(key, data).await?;
        debug!(plaintext_len, envelope_len = envelope.len(), "encrypted");

        session.transition(UploadState::Planning)?;
        let plan = drift_chunks::plan_with_part_size(
            envelope.len() as u64,
            multipart,
            self.part_size,
        )?;
        debug!(
            multipart = plan.is_multipart(),
            transfers = plan.transfer_count(),
            "planned upload"
        );

        let response = match plan {
            UploadPlan::Single { .. } => {
                let upload = SingleUpload {
                    file_name,
                    envelope,
                    expiration_hours,
                    download_limit,
                    key_hex: key_hex.clone(),
                };
                self.upload_single(session, upload).await?
            }
            UploadPlan::Multipart { parts } => {
                self.upload_multipart(session, file_name, envelope, parts)
                    .await?
            }
        };

        let token = normalize_token(&response.url).map_err(|_| {
            DriftError::ProtocolViolation(format!(
                "upload response url has no token: {}",
                response.url
            ))
        })?;

        session.transition(UploadState::Done)?;
        session.progress_mut().complete("upload complete");
        info!(
            token = %token,
            expires_at = %response.expires_at,
            download_limit = response.download_limit,
            "upload complete"
        );

        Ok(ShareReference {
            token,
            key_hex,
            expires_at: response.expires_at,
            download_limit: response.download_limit,
        })
    }

    async fn upload_single(
        &self,
        session: &mut UploadSession,
        upload: SingleUpload,
    ) -> DriftResult<UploadResponse> {
        session.transition(UploadState::UploadingSingle)?;
        session.check_cancelled()?;
        let cancel = session.cancel_token();

        let request = self.api.upload_single(upload);
        tokio::pin!(request);

        let mut ticker = tokio::time::interval(self.progress_tick);
        // the first tick completes immediately
        ticker.tick().await;
        let mut estimate = 0u8;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DriftError::Cancelled),
                result = &mut request => return result,
                _ = ticker.tick() => {
                    estimate = estimate.saturating_add(10).min(90);
                    session.progress_mut().advance(estimate, "uploading");
                }
            }
        }
    }

    async fn upload_multipart(
        &self,
        session: &mut UploadSession,
        file_name: String,
        envelope: Bytes,
        parts: Vec<PartSpan>,
    ) -> DriftResult<UploadResponse> {
        session.transition(UploadState::InitiatingMultipart)?;
        session.check_cancelled()?;
        let cancel = session.cancel_token();

        let init_request = MultipartInitRequest {
            filename: file_name,
            file_size: envelope.len() as u64,
        };
        let init = cancellable(&cancel, self.api.init_multipart(&init_request)).await?;
        debug!(upload_id = %init.upload_id, parts = init.urls.len(), "multipart initiated");

        let upload_id = init.upload_id.clone();
        let result = async {
            let signed = bind_urls(parts, init.urls)?;

            session.transition(UploadState::UploadingParts)?;
            let results = self
                .upload_parts(session, &cancel, envelope, signed)
                .await?;

            session.check_cancelled()?;
            session.transition(UploadState::CompletingMultipart)?;
            let complete = MultipartCompleteRequest {
                key: init.key,
                upload_id: init.upload_id,
                parts: results,
            };
            cancellable(&cancel, self.api.complete_multipart(&complete)).await
        }
        .await;

        if result.is_err() {
            // no abort endpoint: the storage side keeps whatever parts landed
            warn!(upload_id = %upload_id, "abandoning multipart upload");
        }
        result
    }

    /// PUT every part concurrently; the first failure drops the set, aborting
    /// the rest. Results come back ordered by part number.
    async fn upload_parts(
        &self,
        session: &mut UploadSession,
        cancel: &CancellationToken,
        envelope: Bytes,
        signed: Vec<SignedPart>,
    ) -> DriftResult<Vec<PartResult>> {
        let total = signed.len();
        let mut tasks = JoinSet::new();
        for part in signed {
            let api = self.api.clone();
            let body = envelope.slice(part.span.as_usize_range());
            tasks.spawn(async move { api.put_part(part.span.part_number, &part.url, body).await });
        }

        let mut results = Vec::with_capacity(total);
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DriftError::Cancelled),
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            let part = joined
                .map_err(|e| DriftError::Other(anyhow::anyhow!("part upload task failed: {e}")))??;
            debug!(part_number = part.part_number, "part uploaded");
            results.push(part);

            let percent = (results.len() * 100 / (total + 1)) as u8;
            session.progress_mut().advance(
                percent,
                &format!("uploaded part {}/{}", results.len(), total),
            );
        }

        results.sort_by_key(|p| p.part_number);
        Ok(results)
    }
}

/// Pair each planned part with its signed URL. The server must sign exactly
/// the planned part numbers.
fn bind_urls(parts: Vec<PartSpan>, mut urls: Vec<PartUrl>) -> DriftResult<Vec<SignedPart>> {
    if urls.len() != parts.len() {
        return Err(DriftError::ProtocolViolation(format!(
            "server signed {} part urls for {} planned parts",
            urls.len(),
            parts.len()
        )));
    }
    urls.sort_by_key(|u| u.part_number);

    parts
        .into_iter()
        .zip(urls)
        .map(|(span, url)| {
            if span.part_number != url.part_number {
                return Err(DriftError::ProtocolViolation(format!(
                    "expected signed url for part {}, got part {}",
                    span.part_number, url.part_number
                )));
            }
            Ok(SignedPart { span, url: url.url })
        })
        .collect()
}

async fn encrypt_blocking(key: EncryptionKey, data: Vec<u8>) -> DriftResult<Bytes> {
    tokio::task::spawn_blocking(move || drift_crypto::encrypt(&key, &data))
        .await
        .map_err(|e| DriftError::Other(anyhow::anyhow!("encryption task failed: {e}")))?
        .map(Bytes::from)
}
