//! Retrieval: token → ciphertext → plaintext

use futures::StreamExt;
use tracing::{debug, info, warn};

use drift_core::types::FileInfo;
use drift_core::{DriftError, DriftResult, MAX_FILE_SIZE};
use drift_crypto::EncryptionKey;

use crate::api::{network, ApiClient};
use crate::link::{normalize_token, ShareLink};
use crate::session::{cancellable, DownloadSession};

/// Output name used when the server reports no filename
pub const DEFAULT_FILE_NAME: &str = "downloaded-file";

#[derive(Debug, Clone)]
pub struct RetrievalOrchestrator {
    api: ApiClient,
}

impl RetrievalOrchestrator {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Download the envelope behind a token, API URL or share link.
    ///
    /// Progress follows `Content-Length` and stops at 99; the caller owns the
    /// final step.
    pub async fn fetch_ciphertext(
        &self,
        session: &mut DownloadSession,
        token_or_link: &str,
    ) -> DriftResult<Vec<u8>> {
        let token = normalize_token(token_or_link)?;
        let result = self.fetch_token(session, &token).await;
        if let Err(e) = &result {
            warn!(error = %e, "download failed");
            session.progress_mut().reset();
        }
        result
    }

    /// Import `key_hex`, download, and decrypt.
    ///
    /// The key is checked before any request. Every decryption failure is
    /// reported as `AuthenticationFailed`.
    pub async fn retrieve_and_decrypt(
        &self,
        session: &mut DownloadSession,
        token_or_link: &str,
        key_hex: &str,
    ) -> DriftResult<Vec<u8>> {
        let result = self.retrieve(session, token_or_link, key_hex).await;
        if let Err(e) = &result {
            warn!(error = %e, "retrieval failed");
            session.progress_mut().reset();
        }
        result
    }

    /// Retrieve using the key embedded in a share link.
    pub async fn retrieve_link(
        &self,
        session: &mut DownloadSession,
        link: &str,
    ) -> DriftResult<Vec<u8>> {
        let parsed = ShareLink::parse(link)?;
        let key_hex = parsed
            .key_hex
            .ok_or_else(|| DriftError::InvalidLink("link carries no key parameter".into()))?;
        self.retrieve_and_decrypt(session, &parsed.token, &key_hex)
            .await
    }

    /// Metadata of a share without consuming a download.
    pub async fn info(&self, token_or_link: &str) -> DriftResult<FileInfo> {
        let token = normalize_token(token_or_link)?;
        self.api.file_info(&token).await
    }

    /// The server-reported filename, or `downloaded-file`.
    pub async fn suggested_file_name(&self, token_or_link: &str) -> String {
        match self.info(token_or_link).await {
            Ok(FileInfo {
                filename: Some(name),
                ..
            }) if !name.trim().is_empty() => name,
            Ok(_) => DEFAULT_FILE_NAME.to_string(),
            Err(e) => {
                debug!(error = %e, "file info unavailable");
                DEFAULT_FILE_NAME.to_string()
            }
        }
    }

    async fn retrieve(
        &self,
        session: &mut DownloadSession,
        token_or_link: &str,
        key_hex: &str,
    ) -> DriftResult<Vec<u8>> {
        let key = drift_crypto::import_hex(key_hex)?;
        let token = normalize_token(token_or_link)?;

        let envelope = self.fetch_token(session, &token).await?;
        let plaintext = decrypt_blocking(key, envelope).await?;

        session.progress_mut().complete("decrypted");
        info!(token = %token, bytes = plaintext.len(), "retrieved");
        Ok(plaintext)
    }

    async fn fetch_token(&self, session: &mut DownloadSession, token: &str) -> DriftResult<Vec<u8>> {
        let cancel = session.cancel_token();
        let response = cancellable(&cancel, self.api.download(token)).await?;

        let total = response.content_length().filter(|len| *len > 0);
        let mut body = Vec::with_capacity(total.unwrap_or(0).min(MAX_FILE_SIZE) as usize);
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DriftError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            body.extend_from_slice(&chunk.map_err(network)?);

            if let Some(total) = total {
                let percent = (body.len() as u64).saturating_mul(99) / total;
                session
                    .progress_mut()
                    .advance(percent.min(99) as u8, "downloading");
            }
        }

        debug!(token, bytes = body.len(), "downloaded envelope");
        Ok(body)
    }
}

async fn decrypt_blocking(key: EncryptionKey, envelope: Vec<u8>) -> DriftResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || drift_crypto::decrypt(&key, &envelope))
        .await
        .map_err(|e| DriftError::Other(anyhow::anyhow!("decryption task failed: {e}")))?
        .map_err(|e| match e {
            DriftError::MalformedEnvelope { len } => {
                debug!(len, "envelope too short");
                DriftError::AuthenticationFailed
            }
            other => other,
        })
}
