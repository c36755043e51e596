//! File digest

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::update_from_reader;
use crate::error::{Result, UploadError};

/// Read size used while hashing a book: 1MB
pub const FILE_CHUNK_SIZE: usize = 1024 * 1024;

/// Hex-encoded SHA-256 of a file's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileDigest(String);

impl FileDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash everything `reader` yields.
///
/// A read error discards the partial hash.
pub fn digest_reader<R: Read>(reader: R) -> std::io::Result<FileDigest> {
    let mut hasher = Sha256::new();
    update_from_reader(&mut hasher, reader, FILE_CHUNK_SIZE)?;
    Ok(FileDigest(hex::encode(hasher.finalize())))
}

/// Hash a file on disk, streaming it in [`FILE_CHUNK_SIZE`] reads
pub fn digest_file(path: &Path) -> Result<FileDigest> {
    let file = File::open(path).map_err(|e| UploadError::io(path, e))?;
    let digest = digest_reader(file).map_err(|e| UploadError::io(path, e))?;

    tracing::debug!(path = %path.display(), digest = %digest, "Computed file digest");
    Ok(digest)
}
