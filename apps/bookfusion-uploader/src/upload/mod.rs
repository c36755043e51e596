//! Upload Module
//!
//! Three-phase upload of a book to the BookFusion catalog:
//! - init: register the file digest, receive a signed storage destination
//! - transfer: multipart POST of the book straight to object storage
//! - finalize: submit the storage key, both digests and the metadata
//!
//! A session never retries and never rolls back. A failure after init
//! leaves an unused storage key or object on the service side.

pub mod form;
pub mod session;
pub mod transport;
pub mod types;

pub use form::{Form, FormPart, PartBody};
pub use session::UploadSession;
pub use transport::{FormRequest, ReqwestTransport, Transport, TransportError, TransportResponse};
pub use types::*;
