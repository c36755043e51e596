//! BookFusion Uploader Library
//!
//! Uploads a book and its Calibre-style metadata to BookFusion.
//!
//! # Modules
//!
//! - `digest`: file and metadata fingerprints (SHA-256)
//! - `metadata`: the metadata record and Calibre OPF import
//! - `upload`: the init / transfer / finalize session and its transport
//! - `config`: API key and endpoint resolution

pub mod config;
pub mod digest;
pub mod error;
pub mod metadata;
pub mod upload;

pub use config::{ApiKey, ClientConfig};
pub use error::{Result, UploadError};
pub use metadata::{MetadataRecord, SeriesEntry, SeriesIndex};
pub use upload::{Phase, ReqwestTransport, UploadReceipt, UploadSession};
