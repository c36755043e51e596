//! HTTP transport
//!
//! Defines the transport trait the session talks through and the reqwest
//! implementation used by the binary.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use reqwest::multipart::{self, Part};
use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt;

use super::form::{Form, PartBody};
use crate::config::{ApiKey, ClientConfig};

/// Read size used while streaming a file part: 64KB
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// A multipart POST
#[derive(Debug, Clone)]
pub struct FormRequest {
    pub url: String,
    pub form: Form,
    /// Sent as basic auth with an empty password
    pub auth: Option<ApiKey>,
    /// Ask for a JSON response
    pub accept_json: bool,
}

impl FormRequest {
    pub fn new(url: impl Into<String>, form: Form) -> Self {
        Self {
            url: url.into(),
            form,
            auth: None,
            accept_json: false,
        }
    }

    pub fn with_auth(mut self, key: ApiKey) -> Self {
        self.auth = Some(key);
        self
    }

    pub fn accept_json(mut self) -> Self {
        self.accept_json = true;
        self
    }
}

/// Status and body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// `X-Request-Id` header, when the server sent one
    pub request_id: Option<String>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            request_id: None,
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Transport failure: the exchange did not produce a response
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open {path}: {source}")]
    OpenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Transport trait
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a multipart POST and return whatever the server answered
    async fn post_multipart(&self, request: FormRequest) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// Reqwest Transport
// ============================================================================

/// Transport backed by a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("bookfusion-uploader/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn encode(form: Form) -> Result<multipart::Form, TransportError> {
        let mut encoded = multipart::Form::new();

        for part in form {
            encoded = match part.body {
                PartBody::Text(value) => encoded.text(part.name, value),
                PartBody::File {
                    path,
                    file_name,
                    content_type,
                } => {
                    let file_part = file_part(&path).await?
                        .file_name(file_name)
                        .mime_str(&content_type)?;
                    encoded.part(part.name, file_part)
                }
            };
        }

        Ok(encoded)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_multipart(&self, request: FormRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .multipart(Self::encode(request.form).await?);

        if let Some(key) = &request.auth {
            builder = builder.basic_auth(key.expose(), Some(""));
        }
        if request.accept_json {
            builder = builder.header(reqwest::header::ACCEPT, "application/json");
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            body,
            request_id,
        })
    }
}

/// Open `path` as a streamed part with a known length
async fn file_part(path: &Path) -> Result<Part, TransportError> {
    let open_error = |source| TransportError::OpenFile {
        path: path.display().to_string(),
        source,
    };
    let file = tokio::fs::File::open(path).await.map_err(open_error)?;
    let length = file.metadata().await.map_err(open_error)?.len();

    let body = reqwest::Body::wrap_stream(file_chunks(file));
    Ok(Part::stream_with_length(body, length))
}

/// Stream a file in [`STREAM_CHUNK_SIZE`] pieces; the handle closes when
/// the stream is dropped.
fn file_chunks(file: tokio::fs::File) -> impl Stream<Item = std::io::Result<Vec<u8>>> {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some((buf, file)))
    })
}
