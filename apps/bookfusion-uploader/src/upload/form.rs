//! Multipart form model
//!
//! Forms are plain ordered part lists so the same request can be inspected
//! in tests and encoded by any transport. Names may repeat; the finalize
//! form relies on Rails-style `name[]` repetition for its arrays.

use std::path::{Path, PathBuf};

use super::types::StorageDestination;
use crate::digest::{FileDigest, MetadataDigest};
use crate::metadata::MetadataRecord;

/// Fallback content type when the extension is unknown
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Ordered multipart form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    parts: Vec<FormPart>,
}

/// A named part of a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub body: PartBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    Text(String),
    /// Streamed from disk by the transport
    File {
        path: PathBuf,
        file_name: String,
        content_type: String,
    },
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            body: PartBody::Text(value.into()),
        });
        self
    }

    /// Attach a file, inferring its name and content type from the path
    pub fn file(mut self, name: impl Into<String>, path: &Path) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            body: PartBody::File {
                path: path.to_path_buf(),
                file_name: file_name(path),
                content_type: content_type(path),
            },
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Text values of every part called `name`, in order
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|part| part.name == name)
            .filter_map(|part| match &part.body {
                PartBody::Text(value) => Some(value.as_str()),
                PartBody::File { .. } => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl IntoIterator for Form {
    type Item = FormPart;
    type IntoIter = std::vec::IntoIter<FormPart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}

/// Content type inferred from the file extension
pub fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Phase Forms
// ============================================================================

/// Session initialization: the file name and its digest
pub fn init_form(file_name: &str, file_digest: &FileDigest) -> Form {
    Form::new()
        .text("filename", file_name)
        .text("digest", file_digest.as_str())
}

/// Direct upload: every storage param, then the book itself as `file`
pub fn transfer_form(destination: &StorageDestination, document: &Path) -> Form {
    destination
        .params
        .iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value))
        .file("file", document)
}

/// Finalization: storage key, both digests and the metadata fields.
///
/// Optional scalars are only sent when non-empty. When bookshelves is
/// present an empty `metadata[bookshelves][]` part goes first so the
/// server always sees an array, even with no shelves.
pub fn finalize_form(
    key: &str,
    file_digest: &FileDigest,
    metadata_digest: &MetadataDigest,
    record: &MetadataRecord,
    cover: Option<&Path>,
) -> Form {
    let mut form = Form::new()
        .text("key", key)
        .text("digest", file_digest.as_str())
        .text("metadata[calibre_metadata_digest]", metadata_digest.as_str())
        .text("metadata[title]", record.title.as_str());

    for (field, value) in record.scalars().into_iter().skip(1) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            form = form.text(format!("metadata[{field}]"), value);
        }
    }

    for entry in &record.series {
        form = form.text("metadata[series][][title]", entry.title.as_str());
        if let Some(index) = &entry.index {
            form = form.text("metadata[series][][index]", index.to_string());
        }
    }

    for author in &record.author_list {
        form = form.text("metadata[author_list][]", author.as_str());
    }
    for tag in &record.tag_list {
        form = form.text("metadata[tag_list][]", tag.as_str());
    }

    if let Some(shelves) = &record.bookshelves {
        form = form.text("metadata[bookshelves][]", "");
        for shelf in shelves {
            form = form.text("metadata[bookshelves][]", shelf.as_str());
        }
    }

    if let Some(cover) = cover.filter(|path| path.is_file()) {
        form = form.file("metadata[cover]", cover);
    }

    form
}
