//! Caller-owned transfer sessions
//!
//! A session is created by the caller, passed by `&mut` into one upload or
//! retrieval, and inspected afterwards. Nothing in it is shared between
//! attempts.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use drift_core::{DriftError, DriftResult};

/// Progress notification delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// New high-water mark in [0, 100]
    Advance { percent: u8, message: String },
    /// The attempt failed; any indicator should return to its idle state
    Reset,
}

/// Progress callback type
pub type ProgressFn = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits a non-decreasing percentage to an optional callback.
#[derive(Default)]
pub struct ProgressReporter {
    callback: Option<ProgressFn>,
    percent: u8,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressFn>) -> Self {
        Self {
            callback,
            percent: 0,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Report `percent`; values at or below the current mark are dropped.
    pub fn advance(&mut self, percent: u8, message: &str) {
        let percent = percent.min(100);
        if percent <= self.percent {
            return;
        }
        self.percent = percent;
        if let Some(cb) = &self.callback {
            cb(ProgressEvent::Advance {
                percent,
                message: message.to_string(),
            });
        }
    }

    pub fn complete(&mut self, message: &str) {
        self.advance(100, message);
    }

    pub fn reset(&mut self) {
        self.percent = 0;
        if let Some(cb) = &self.callback {
            cb(ProgressEvent::Reset);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("percent", &self.percent)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Steps of one upload attempt.
///
/// ```text
/// Idle → Encrypting → Planning ─┬→ UploadingSingle ─────────────────────────────┬→ Done
///                               └→ InitiatingMultipart → UploadingParts → CompletingMultipart ┘
/// ```
/// `Failed` is reachable from every non-terminal state; `Done` and `Failed` absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Encrypting,
    Planning,
    UploadingSingle,
    InitiatingMultipart,
    UploadingParts,
    CompletingMultipart,
    Done,
    Failed,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Done | UploadState::Failed)
    }

    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Encrypting)
            | (Encrypting, Planning)
            | (Planning, UploadingSingle)
            | (Planning, InitiatingMultipart)
            | (InitiatingMultipart, UploadingParts)
            | (UploadingParts, CompletingMultipart)
            | (UploadingSingle, Done)
            | (CompletingMultipart, Done) => true,
            _ => false,
        }
    }
}

/// State, progress and cancellation for one upload attempt.
#[derive(Debug)]
pub struct UploadSession {
    state: UploadState,
    history: Vec<UploadState>,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            state: UploadState::Idle,
            history: vec![UploadState::Idle],
            progress: ProgressReporter::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, callback: ProgressFn) -> Self {
        self.progress = ProgressReporter::new(Some(callback));
        self
    }

    /// Abort the attempt when `cancel` fires (checked before every network step).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Every state the attempt has passed through, in order
    pub fn history(&self) -> &[UploadState] {
        &self.history
    }

    pub fn percent(&self) -> u8 {
        self.progress.percent()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn progress_mut(&mut self) -> &mut ProgressReporter {
        &mut self.progress
    }

    pub(crate) fn transition(&mut self, next: UploadState) -> DriftResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(DriftError::Other(anyhow::anyhow!(
                "illegal upload transition {:?} -> {:?}",
                self.state,
                next
            )));
        }
        debug!(from = ?self.state, to = ?next, "upload state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` (unless already terminal) and reset progress.
    pub(crate) fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = UploadState::Failed;
            self.history.push(UploadState::Failed);
        }
        self.progress.reset();
    }

    pub(crate) fn check_cancelled(&self) -> DriftResult<()> {
        if self.cancel.is_cancelled() {
            return Err(DriftError::Cancelled);
        }
        Ok(())
    }
}

/// Progress and cancellation for one retrieval.
#[derive(Debug, Default)]
pub struct DownloadSession {
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl DownloadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, callback: ProgressFn) -> Self {
        self.progress = ProgressReporter::new(Some(callback));
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn percent(&self) -> u8 {
        self.progress.percent()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn progress_mut(&mut self) -> &mut ProgressReporter {
        &mut self.progress
    }
}

/// Race `fut` against cancellation.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = DriftResult<T>>,
) -> DriftResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DriftError::Cancelled),
        result = fut => result,
    }
}
