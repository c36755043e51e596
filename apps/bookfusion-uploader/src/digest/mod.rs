//! Content fingerprints
//!
//! Two SHA-256 digests travel with every upload:
//! - the file digest, over the raw book bytes
//! - the metadata digest, over the metadata record and cover image, laid
//!   out exactly as the Calibre plugin does so the service can spot
//!   duplicate submissions

pub mod file;
pub mod metadata;

use std::io::{ErrorKind, Read};

use sha2::{Digest, Sha256};

pub use file::{digest_file, digest_reader, FileDigest, FILE_CHUNK_SIZE};
pub use metadata::{digest_metadata, MetadataDigest, COVER_CHUNK_SIZE};

/// Feed everything `reader` yields into `hasher`, `chunk_size` bytes at a time.
///
/// Returns the number of bytes hashed.
pub(crate) fn update_from_reader<R: Read>(
    hasher: &mut Sha256,
    mut reader: R,
    chunk_size: usize,
) -> std::io::Result<u64> {
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;

    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..read]);
        total += read as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    /// Serves a fixed prefix, then returns `kind` errors
    struct Flaky {
        prefix: Vec<u8>,
        kind: ErrorKind,
        interruptions: usize,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.interruptions > 0 {
                self.interruptions -= 1;
                return Err(ErrorKind::Interrupted.into());
            }
            if self.prefix.is_empty() {
                return Err(self.kind.into());
            }
            let n = self.prefix.len().min(buf.len());
            buf[..n].copy_from_slice(&self.prefix[..n]);
            self.prefix.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn test_update_from_reader_propagates_errors() {
        let mut hasher = Sha256::new();
        let reader = Flaky {
            prefix: b"partial".to_vec(),
            kind: ErrorKind::BrokenPipe,
            interruptions: 0,
        };

        let err = update_from_reader(&mut hasher, reader, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_update_from_reader_retries_interrupted() {
        let mut hasher = Sha256::new();
        let reader = Flaky {
            prefix: Vec::new(),
            kind: ErrorKind::UnexpectedEof,
            interruptions: 3,
        };

        // Interrupted reads are retried, the next error still surfaces
        let err = update_from_reader(&mut hasher, reader, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_update_from_reader_counts_bytes() {
        let mut hasher = Sha256::new();
        let total = update_from_reader(&mut hasher, &b"hello world\n"[..], 4).unwrap();
        assert_eq!(total, 12);
        assert_eq!(
            hex::encode(hasher.finalize()),
            "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447"
        );
    }
}
