//! drift-client: moves encrypted files to and from the share API
//!
//! - `api`: typed wrappers over the HTTP endpoints (reqwest)
//! - `link`: token extraction from bare tokens, API URLs and share links
//! - `session`: caller-owned progress, cancellation and upload state
//! - `upload`: encrypt → plan → single-shot or multipart transfer → share reference
//! - `retrieve`: fetch by token → decrypt

pub mod api;
pub mod link;
pub mod retrieve;
pub mod session;
pub mod upload;

pub use api::{ApiClient, SingleUpload};
pub use link::{normalize_token, ShareLink};
pub use retrieve::{RetrievalOrchestrator, DEFAULT_FILE_NAME};
pub use session::{
    DownloadSession, ProgressEvent, ProgressFn, ProgressReporter, UploadSession, UploadState,
};
pub use upload::{UploadOrchestrator, UploadRequest};
