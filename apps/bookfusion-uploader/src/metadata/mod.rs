//! Book metadata
//!
//! The record uploaded with each book, plus import from Calibre's
//! metadata.opf files.

pub mod opf;
pub mod types;

pub use opf::CalibreMetadata;
pub use types::*;
