//! Metadata digest
//!
//! Byte layout, fed into a single SHA-256 with no separators:
//!
//! 1. title, summary, language, isbn, issued_on (each only when present)
//! 2. per series entry: title, then the rendered index when present
//! 3. each author, then each tag, in record order
//! 4. each bookshelf, only when bookshelves is present
//! 5. cover: `size` zero bytes, one more zero byte, then the cover bytes
//!
//! The service recomputes this independently, so the layout must not change.
//! An absent bookshelf list and an empty one hash identically.

use std::fmt;
use std::fs::File;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::update_from_reader;
use crate::error::{Result, UploadError};
use crate::metadata::MetadataRecord;

/// Read size used while hashing a cover image: 64KB
pub const COVER_CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 of a metadata record and its cover
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataDigest(String);

impl MetadataDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetadataDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the metadata digest for `record` and an optional cover image.
///
/// A cover path that does not point at an existing file contributes nothing.
pub fn digest_metadata(record: &MetadataRecord, cover: Option<&Path>) -> Result<MetadataDigest> {
    let mut hasher = Sha256::new();

    for (_, value) in record.scalars() {
        if let Some(value) = value {
            hasher.update(value.as_bytes());
        }
    }

    for entry in &record.series {
        hasher.update(entry.title.as_bytes());
        if let Some(index) = &entry.index {
            hasher.update(index.to_string().as_bytes());
        }
    }

    for author in &record.author_list {
        hasher.update(author.as_bytes());
    }
    for tag in &record.tag_list {
        hasher.update(tag.as_bytes());
    }

    if let Some(shelves) = &record.bookshelves {
        for shelf in shelves {
            hasher.update(shelf.as_bytes());
        }
    }

    if let Some(cover) = cover.filter(|path| path.is_file()) {
        update_with_cover(&mut hasher, cover)?;
    }

    Ok(MetadataDigest(hex::encode(hasher.finalize())))
}

fn update_with_cover(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| UploadError::io(path, e))?;
    let size = file.metadata().map_err(|e| UploadError::io(path, e))?.len();

    let zeros = [0u8; COVER_CHUNK_SIZE];
    let mut remaining = size;
    while remaining > 0 {
        let n = remaining.min(COVER_CHUNK_SIZE as u64) as usize;
        hasher.update(&zeros[..n]);
        remaining -= n as u64;
    }
    hasher.update([0u8]);

    update_from_reader(hasher, file, COVER_CHUNK_SIZE).map_err(|e| UploadError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{SeriesEntry, SeriesIndex};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const COVER_BYTES: &[u8] = b"\x89PNG\r\n\x1a\ncover";

    fn cover_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    fn sha256_of(parts: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        hex::encode(hasher.finalize())
    }

    fn foo_by_author() -> MetadataRecord {
        MetadataRecord {
            author_list: vec!["A. Author".to_string()],
            ..MetadataRecord::new("Foo")
        }
    }

    fn full_record() -> MetadataRecord {
        MetadataRecord {
            title: "Dune".to_string(),
            summary: Some("Spice".to_string()),
            language: Some("eng".to_string()),
            isbn: Some("9780441013593".to_string()),
            issued_on: Some("1965-08-01".to_string()),
            series: vec![
                SeriesEntry::new("Dune Chronicles", Some(SeriesIndex::Integer(1))),
                SeriesEntry::new("Dune Saga", Some(SeriesIndex::Fractional(1.5))),
                SeriesEntry::new("Extra", None),
            ],
            author_list: vec!["Frank Herbert".to_string()],
            tag_list: vec!["scifi".to_string(), "classic".to_string()],
            bookshelves: Some(vec!["Favorites".to_string()]),
        }
    }

    #[test]
    fn test_title_and_author_are_concatenated() {
        let digest = digest_metadata(&foo_by_author(), None).unwrap();
        assert_eq!(digest.as_str(), sha256_of(&[b"Foo", b"A. Author"]));
        assert_eq!(
            digest.as_str(),
            "9326972900fb44bbdeef4e19ed040fd0b1e53add18875c4b7562ddcd70cad994"
        );
    }

    #[test]
    fn test_absent_and_empty_bookshelves_collide() {
        let absent = foo_by_author();
        let empty = MetadataRecord {
            bookshelves: Some(vec![]),
            ..foo_by_author()
        };

        assert_eq!(
            digest_metadata(&absent, None).unwrap(),
            digest_metadata(&empty, None).unwrap()
        );
    }

    #[test]
    fn test_integer_series_index_has_no_decimal_point() {
        let record = MetadataRecord {
            series: vec![SeriesEntry::new("Series X", Some(SeriesIndex::Integer(1)))],
            ..MetadataRecord::new("Foo")
        };
        let digest = digest_metadata(&record, None).unwrap();
        assert_eq!(digest.as_str(), sha256_of(&[b"Foo", b"Series X", b"1"]));
    }

    #[test]
    fn test_whole_fractional_series_index_keeps_decimal_point() {
        let record = MetadataRecord {
            series: vec![SeriesEntry::new("Series X", Some(SeriesIndex::Fractional(2.0)))],
            ..MetadataRecord::new("Foo")
        };
        let digest = digest_metadata(&record, None).unwrap();
        assert_eq!(
            digest.as_str(),
            "ef4f77077007c94a7fb355c69e60902cb4cd46f59cb94f2d502e000970068b3d"
        );
    }

    #[test]
    fn test_full_record_matches_reference() {
        let digest = digest_metadata(&full_record(), None).unwrap();
        assert_eq!(
            digest.as_str(),
            "0bb2e1136cb9bce3c25997116fa19bb82de8c1ed8c7c3fe866d8c8504437b598"
        );
    }

    #[test]
    fn test_full_record_with_cover_matches_reference() {
        let cover = cover_file(COVER_BYTES);
        let digest = digest_metadata(&full_record(), Some(cover.path())).unwrap();
        assert_eq!(
            digest.as_str(),
            "d9659aaa6f1b9da1035ffe4bd424d2e5cacd0af4b19fddd8ccb580abb2a202b7"
        );
    }

    #[test]
    fn test_cover_layout() {
        let cover = cover_file(b"\x89PNG");
        let record = MetadataRecord::new("Foo");
        let digest = digest_metadata(&record, Some(cover.path())).unwrap();

        assert_eq!(digest.as_str(), sha256_of(&[b"Foo", &[0u8; 4], &[0u8], b"\x89PNG"]));
    }

    #[test]
    fn test_cover_changes_digest() {
        let cover = cover_file(COVER_BYTES);
        let record = foo_by_author();

        assert_ne!(
            digest_metadata(&record, None).unwrap(),
            digest_metadata(&record, Some(cover.path())).unwrap()
        );
    }

    #[test]
    fn test_identical_covers_at_different_paths_match() {
        let first = cover_file(COVER_BYTES);
        let second = cover_file(COVER_BYTES);
        let record = foo_by_author();

        assert_eq!(
            digest_metadata(&record, Some(first.path())).unwrap(),
            digest_metadata(&record, Some(second.path())).unwrap()
        );
    }

    #[test]
    fn test_missing_cover_is_ignored() {
        let record = foo_by_author();
        let missing = Path::new("/definitely/not/cover.jpg");

        assert_eq!(
            digest_metadata(&record, Some(missing)).unwrap(),
            digest_metadata(&record, None).unwrap()
        );
    }

    #[test]
    fn test_large_cover_streams_zero_prefix() {
        let bytes = vec![7u8; COVER_CHUNK_SIZE * 3 + 5];
        let cover = cover_file(&bytes);
        let digest = digest_metadata(&MetadataRecord::new("Foo"), Some(cover.path())).unwrap();

        let zeros = vec![0u8; bytes.len() + 1];
        assert_eq!(digest.as_str(), sha256_of(&[b"Foo", zeros.as_slice(), bytes.as_slice()]));
    }

    #[test]
    fn test_list_order_changes_digest() {
        let base = full_record();
        let base_digest = digest_metadata(&base, None).unwrap();

        let mut authors = base.clone();
        authors.author_list = vec!["B".to_string(), "A".to_string()];
        let mut authors_swapped = base.clone();
        authors_swapped.author_list = vec!["A".to_string(), "B".to_string()];
        assert_ne!(
            digest_metadata(&authors, None).unwrap(),
            digest_metadata(&authors_swapped, None).unwrap()
        );

        let mut tags = base.clone();
        tags.tag_list.reverse();
        assert_ne!(digest_metadata(&tags, None).unwrap(), base_digest);

        let mut series = base.clone();
        series.series.reverse();
        assert_ne!(digest_metadata(&series, None).unwrap(), base_digest);
    }

    #[test]
    fn test_present_shelves_change_digest() {
        let without = foo_by_author();
        let with = MetadataRecord {
            bookshelves: Some(vec!["Favorites".to_string()]),
            ..foo_by_author()
        };
        assert_ne!(
            digest_metadata(&without, None).unwrap(),
            digest_metadata(&with, None).unwrap()
        );
    }
}
