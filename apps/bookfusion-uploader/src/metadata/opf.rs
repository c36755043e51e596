//! Metadata import from Calibre metadata.opf files
//!
//! Reads the Dublin Core block Calibre writes next to every book so an
//! upload can reuse the library's metadata instead of repeating it on the
//! command line.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate};
use quick_xml::de::from_str;
use serde::Deserialize;

use super::types::{MetadataRecord, SeriesEntry, SeriesIndex};
use crate::error::{Result, UploadError};

/// Calibre stores "no date" as 0101-01-01
const UNDEFINED_YEAR_MAX: i32 = 101;

/// Metadata parsed from a Calibre OPF package
#[derive(Debug, Clone, Default)]
pub struct CalibreMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub pubdate: Option<String>,
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub series_index: Option<String>,
    /// Cover href as written in the package, relative to the OPF file
    pub cover_href: Option<String>,
}

impl CalibreMetadata {
    /// Parse metadata from an OPF XML string
    pub fn parse(xml: &str) -> Result<Self> {
        let package: OPFPackage = from_str(xml)?;
        Ok(Self::from_opf(package))
    }

    /// Read and parse an OPF file
    pub fn load(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path).map_err(|e| UploadError::io(path, e))?;
        let metadata = Self::parse(&xml)?;
        tracing::debug!(
            opf = %path.display(),
            title = ?metadata.title,
            authors = metadata.authors.len(),
            "Loaded Calibre metadata"
        );
        Ok(metadata)
    }

    fn from_opf(package: OPFPackage) -> Self {
        let metadata = package.metadata;
        let mut result = CalibreMetadata::default();

        result.title = metadata.title.map(|t| t.content).and_then(non_empty);

        if let Some(creators) = metadata.creator {
            result.authors = creators
                .into_iter()
                .filter(|c| c.role.as_deref().map_or(true, |role| role == "aut"))
                .filter_map(|c| c.content.and_then(non_empty))
                .collect();
        }

        if let Some(dates) = metadata.date {
            for date in dates {
                if date.event.as_deref() == Some("publication") || result.pubdate.is_none() {
                    result.pubdate = date.content.and_then(|d| normalize_date(&d));
                }
            }
        }

        result.language = metadata.language.map(|l| l.content).and_then(non_empty);
        result.description = metadata.description.map(|d| d.content).and_then(non_empty);

        if let Some(subjects) = metadata.subject {
            result.tags = subjects
                .into_iter()
                .filter_map(|s| non_empty(s.content))
                .collect();
        }

        if let Some(identifiers) = metadata.identifier {
            result.isbn = identifiers.into_iter().find_map(isbn_from_identifier);
        }

        if let Some(metas) = metadata.meta {
            for meta in metas {
                match meta.name.as_deref() {
                    Some("calibre:series") => result.series = meta.content.and_then(non_empty),
                    Some("calibre:series_index") => result.series_index = meta.content,
                    _ => {}
                }
            }
        }

        // Calibre points at the cover through <guide>, EPUB3 through the manifest
        result.cover_href = package
            .guide
            .and_then(|guide| {
                guide
                    .reference
                    .into_iter()
                    .find(|r| r.kind.as_deref() == Some("cover"))
                    .and_then(|r| r.href)
            })
            .or_else(|| {
                package.manifest.and_then(|manifest| {
                    manifest
                        .item
                        .into_iter()
                        .find(|item| {
                            item.id.as_deref() == Some("cover")
                                || item.properties.as_deref() == Some("cover-image")
                        })
                        .and_then(|item| item.href)
                })
            });

        result
    }

    /// Build a metadata record, using `fallback_title` when the package has none
    pub fn into_record(self, fallback_title: &str) -> MetadataRecord {
        let series = self
            .series
            .map(|title| {
                let index = self.series_index.as_deref().map(SeriesIndex::parse);
                vec![SeriesEntry::new(title, index)]
            })
            .unwrap_or_default();

        MetadataRecord {
            title: self.title.unwrap_or_else(|| fallback_title.to_string()),
            summary: self.description,
            language: self.language,
            isbn: self.isbn,
            issued_on: self.pubdate,
            series,
            author_list: self.authors,
            tag_list: self.tags,
            bookshelves: None,
        }
    }

    /// Cover path resolved against the directory holding the OPF file
    pub fn cover_path(&self, opf_path: &Path) -> Option<PathBuf> {
        let href = self.cover_href.as_deref()?;
        let base = opf_path.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(href))
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn isbn_from_identifier(id: DCIdentifier) -> Option<String> {
    let content = id.content?;
    let content = content.trim();
    let scheme = id.scheme.as_deref().unwrap_or_default();

    if scheme.eq_ignore_ascii_case("isbn") {
        return non_empty(content.to_string());
    }
    let lowered = content.to_ascii_lowercase();
    ["urn:isbn:", "isbn:"]
        .iter()
        .find_map(|prefix| lowered.strip_prefix(prefix).map(|_| content[prefix.len()..].to_string()))
        .and_then(non_empty)
}

/// Reduce an OPF date to `YYYY-MM-DD`; Calibre's undefined date becomes `None`
fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"));

    match date {
        Ok(date) if date.year() <= UNDEFINED_YEAR_MAX => None,
        Ok(date) => Some(date.format("%Y-%m-%d").to_string()),
        Err(_) => non_empty(raw.to_string()),
    }
}

// OPF XML structures for deserialization

#[derive(Debug, Deserialize)]
struct OPFPackage {
    metadata: OPFMetadata,
    manifest: Option<OPFManifest>,
    guide: Option<OPFGuide>,
}

#[derive(Debug, Deserialize)]
struct OPFMetadata {
    #[serde(rename = "title", default)]
    title: Option<DCElement>,

    #[serde(rename = "creator", default)]
    creator: Option<Vec<DCCreator>>,

    #[serde(rename = "date", default)]
    date: Option<Vec<DCDate>>,

    #[serde(rename = "language", default)]
    language: Option<DCElement>,

    #[serde(rename = "description", default)]
    description: Option<DCElement>,

    #[serde(rename = "subject", default)]
    subject: Option<Vec<DCElement>>,

    #[serde(rename = "identifier", default)]
    identifier: Option<Vec<DCIdentifier>>,

    #[serde(rename = "meta", default)]
    meta: Option<Vec<OPFMeta>>,
}

#[derive(Debug, Deserialize)]
struct DCElement {
    #[serde(rename = "$text", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct DCCreator {
    #[serde(rename = "@role", default)]
    role: Option<String>,

    #[serde(rename = "$text", default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DCDate {
    #[serde(rename = "@event", default)]
    event: Option<String>,

    #[serde(rename = "$text", default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DCIdentifier {
    #[serde(rename = "@scheme", default)]
    scheme: Option<String>,

    #[serde(rename = "$text", default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OPFMeta {
    #[serde(rename = "@name", default)]
    name: Option<String>,

    #[serde(rename = "@content", default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OPFManifest {
    #[serde(rename = "item", default)]
    item: Vec<OPFManifestItem>,
}

#[derive(Debug, Deserialize)]
struct OPFManifestItem {
    #[serde(rename = "@id", default)]
    id: Option<String>,

    #[serde(rename = "@href", default)]
    href: Option<String>,

    #[serde(rename = "@properties", default)]
    properties: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OPFGuide {
    #[serde(rename = "reference", default)]
    reference: Vec<OPFReference>,
}

#[derive(Debug, Deserialize)]
struct OPFReference {
    #[serde(rename = "@type", default)]
    kind: Option<String>,

    #[serde(rename = "@href", default)]
    href: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALIBRE_OPF: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="uuid_id" version="2.0">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>Test Book</dc:title>
        <dc:creator opf:file-as="Author, Test" opf:role="aut">Test Author</dc:creator>
        <dc:creator opf:role="aut">Second Author</dc:creator>
        <dc:date>2010-05-01T07:00:00+00:00</dc:date>
        <dc:description>A short summary.</dc:description>
        <dc:language>eng</dc:language>
        <dc:identifier opf:scheme="calibre">42</dc:identifier>
        <dc:identifier opf:scheme="ISBN">9781234567890</dc:identifier>
        <dc:subject>Fantasy</dc:subject>
        <dc:subject>Adventure</dc:subject>
        <meta name="calibre:series" content="Test Series"/>
        <meta name="calibre:series_index" content="1.0"/>
    </metadata>
    <guide>
        <reference type="cover" title="Cover" href="cover.jpg"/>
    </guide>
</package>"#;

    #[test]
    fn test_parse_calibre_opf() {
        let metadata = CalibreMetadata::parse(CALIBRE_OPF).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Test Book"));
        assert_eq!(metadata.authors, vec!["Test Author", "Second Author"]);
        assert_eq!(metadata.pubdate.as_deref(), Some("2010-05-01"));
        assert_eq!(metadata.language.as_deref(), Some("eng"));
        assert_eq!(metadata.isbn.as_deref(), Some("9781234567890"));
        assert_eq!(metadata.tags, vec!["Fantasy", "Adventure"]);
        assert_eq!(metadata.series.as_deref(), Some("Test Series"));
        assert_eq!(metadata.cover_href.as_deref(), Some("cover.jpg"));
    }

    #[test]
    fn test_into_record() {
        let record = CalibreMetadata::parse(CALIBRE_OPF)
            .unwrap()
            .into_record("fallback");

        assert_eq!(record.title, "Test Book");
        assert_eq!(record.summary.as_deref(), Some("A short summary."));
        assert_eq!(
            record.series,
            vec![SeriesEntry::new("Test Series", Some(SeriesIndex::Fractional(1.0)))]
        );
        assert_eq!(record.bookshelves, None);
    }

    #[test]
    fn test_cover_path_is_relative_to_opf() {
        let metadata = CalibreMetadata::parse(CALIBRE_OPF).unwrap();
        let cover = metadata.cover_path(Path::new("/library/Author/Book/metadata.opf"));
        assert_eq!(cover, Some(PathBuf::from("/library/Author/Book/cover.jpg")));
    }

    #[test]
    fn test_undefined_date_is_dropped() {
        assert_eq!(normalize_date("0101-01-01T00:00:00+00:00"), None);
        assert_eq!(normalize_date("1999-12-31"), Some("1999-12-31".to_string()));
        assert_eq!(normalize_date("circa 1850"), Some("circa 1850".to_string()));
    }

    #[test]
    fn test_isbn_from_prefixed_identifier() {
        let id = DCIdentifier {
            scheme: None,
            content: Some("urn:isbn:9780000000002".to_string()),
        };
        assert_eq!(isbn_from_identifier(id).as_deref(), Some("9780000000002"));
    }

    #[test]
    fn test_missing_title_uses_fallback() {
        let xml = r#"<package><metadata><dc:creator>Someone</dc:creator></metadata></package>"#;
        let record = CalibreMetadata::parse(xml).unwrap().into_record("my-book");
        assert_eq!(record.title, "my-book");
        assert_eq!(record.author_list, vec!["Someone"]);
    }
}
