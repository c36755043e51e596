//! Upload Session
//!
//! Drives one book through the three exchanges:
//! 1. init: announce the file, receive a storage destination and key
//! 2. transfer: POST the book straight to storage
//! 3. finalize: hand the key, digests and metadata to the catalog
//!
//! Phases run strictly in order, once each. The first failure is terminal
//! and nothing already created remotely is cleaned up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use super::form::{finalize_form, init_form, transfer_form};
use super::transport::{FormRequest, Transport, TransportError, TransportResponse};
use super::types::{
    remote_id, Phase, PhaseFailure, SessionState, StorageDestination, UploadReceipt,
    CATALOG_SUCCESS, STORAGE_SUCCESS,
};
use crate::config::ClientConfig;
use crate::digest::{digest_metadata, FileDigest};
use crate::error::{Result, UploadError};
use crate::metadata::MetadataRecord;

/// Single-use upload of one file
pub struct UploadSession {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    document: PathBuf,
    file_name: String,
    file_digest: FileDigest,
    state: SessionState,
}

impl UploadSession {
    /// Create a session for `document`, whose digest was computed up front.
    ///
    /// The path must end in a file name; it is announced to the catalog at init.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        document: impl Into<PathBuf>,
        file_digest: FileDigest,
    ) -> Result<Self> {
        let document = document.into();
        let file_name = document
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| UploadError::InvalidDocument(document.clone()))?;

        Ok(Self {
            transport,
            config,
            document,
            file_name,
            file_digest,
            state: SessionState::Created,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn failure(&self) -> Option<&PhaseFailure> {
        match &self.state {
            SessionState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn file_digest(&self) -> &FileDigest {
        &self.file_digest
    }

    /// Run all three phases, stopping at the first failure
    pub async fn run(
        &mut self,
        record: &MetadataRecord,
        cover: Option<&Path>,
    ) -> Result<UploadReceipt> {
        self.initialize().await?;
        self.transfer().await?;
        self.finalize(record, cover).await
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// `Created -> Initialized`
    pub async fn initialize(&mut self) -> Result<StorageDestination> {
        if !matches!(self.state, SessionState::Created) {
            return Err(self.out_of_sequence("initialize"));
        }

        let request = FormRequest::new(
            self.config.init_url(),
            init_form(&self.file_name, &self.file_digest),
        )
        .with_auth(self.config.api_key.clone());

        let outcome = self
            .exchange(Phase::Init, request)
            .await
            .and_then(|response| parse_init(&response));
        let destination = self.settle(Phase::Init, outcome)?;

        tracing::info!(
            file_name = %self.file_name,
            key = %destination.key,
            "Upload session initialized"
        );

        self.state = SessionState::Initialized(destination.clone());
        Ok(destination)
    }

    /// `Initialized -> Uploaded`
    pub async fn transfer(&mut self) -> Result<()> {
        let destination = match &self.state {
            SessionState::Initialized(destination) => destination.clone(),
            _ => return Err(self.out_of_sequence("transfer")),
        };

        // Storage authenticates through the signed params, not the API key
        let request = FormRequest::new(
            destination.url.clone(),
            transfer_form(&destination, &self.document),
        );

        let outcome = self
            .exchange(Phase::Transfer, request)
            .await
            .and_then(|response| check_transfer(&response));
        self.settle(Phase::Transfer, outcome)?;

        tracing::info!(key = %destination.key, "Book transferred to storage");

        self.state = SessionState::Uploaded(destination);
        Ok(())
    }

    /// `Uploaded -> Finalized`
    pub async fn finalize(
        &mut self,
        record: &MetadataRecord,
        cover: Option<&Path>,
    ) -> Result<UploadReceipt> {
        let key = match &self.state {
            SessionState::Uploaded(destination) => destination.key.clone(),
            _ => return Err(self.out_of_sequence("finalize")),
        };

        let metadata_digest = self.settle(Phase::Finalize, digest_metadata(record, cover))?;
        tracing::debug!(metadata_digest = %metadata_digest, "Computed metadata digest");

        let form = finalize_form(&key, &self.file_digest, &metadata_digest, record, cover);
        let request = FormRequest::new(self.config.finalize_url(), form)
            .with_auth(self.config.api_key.clone())
            .accept_json();

        let outcome = self
            .exchange(Phase::Finalize, request)
            .await
            .and_then(|response| parse_finalize(&response));
        let id = self.settle(Phase::Finalize, outcome)?;

        let receipt = UploadReceipt::new(id, key, &self.file_digest, &metadata_digest);
        tracing::info!(id = %receipt.id_text(), key = %receipt.key, "Upload finalized");

        self.state = SessionState::Finalized(receipt.clone());
        Ok(receipt)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn exchange(&self, phase: Phase, request: FormRequest) -> Result<TransportResponse> {
        tracing::debug!(phase = %phase, url = %request.url, parts = request.form.len(), "Sending request");

        let response = self
            .transport
            .post_multipart(request)
            .await
            .map_err(|err| match err {
                TransportError::OpenFile { path, source } => UploadError::Io {
                    path: path.into(),
                    source,
                },
                other => UploadError::Transport {
                    phase,
                    message: other.to_string(),
                },
            })?;

        tracing::debug!(
            phase = %phase,
            status = response.status,
            request_id = response.request_id.as_deref().unwrap_or(""),
            "Received response"
        );
        Ok(response)
    }

    /// Record a failed phase as the terminal state
    fn settle<T>(&mut self, phase: Phase, outcome: Result<T>) -> Result<T> {
        outcome.map_err(|err| {
            tracing::warn!(phase = %phase, error = %err, "Upload phase failed");
            self.state = SessionState::Failed(PhaseFailure {
                phase,
                cause: err.to_string(),
            });
            err
        })
    }

    fn out_of_sequence(&self, operation: &'static str) -> UploadError {
        UploadError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }
}

// ============================================================================
// Response Checks
// ============================================================================

fn catalog_json(phase: Phase, response: &TransportResponse) -> Result<Value> {
    if !CATALOG_SUCCESS.contains(&response.status) {
        return Err(UploadError::protocol(phase, response.status, "unexpected status", &response.body));
    }
    response
        .json()
        .map_err(|_| UploadError::protocol(phase, response.status, "response is not JSON", &response.body))
}

fn parse_init(response: &TransportResponse) -> Result<StorageDestination> {
    let body = catalog_json(Phase::Init, response)?;
    StorageDestination::from_init_body(&body)
        .map_err(|reason| UploadError::protocol(Phase::Init, response.status, reason, &response.body))
}

fn check_transfer(response: &TransportResponse) -> Result<()> {
    if response.status == STORAGE_SUCCESS {
        Ok(())
    } else {
        Err(UploadError::protocol(
            Phase::Transfer,
            response.status,
            "expected 204 No Content",
            &response.body,
        ))
    }
}

fn parse_finalize(response: &TransportResponse) -> Result<Value> {
    let body = catalog_json(Phase::Finalize, response)?;
    remote_id(&body).ok_or_else(|| {
        UploadError::protocol(Phase::Finalize, response.status, "response missing `id`", &response.body)
    })
}

// ============================================================================
// Tests
// ============================================================================
