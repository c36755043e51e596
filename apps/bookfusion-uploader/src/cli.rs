//! Command-line arguments

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use bookfusion_uploader::config::{ApiKey, ClientConfig};
use bookfusion_uploader::metadata::{CalibreMetadata, MetadataRecord, SeriesEntry};
use bookfusion_uploader::Result;

/// Upload a file to BookFusion like the Calibre plugin.
#[derive(Debug, Parser)]
#[command(name = "bookfusion-upload", version)]
pub struct Args {
    /// Path to book file (.pdf/.epub/.mobi/.azw3)
    pub file: PathBuf,

    /// BookFusion Calibre API key. If omitted, reads --api-key-file or env BF_API_KEY.
    #[arg(long)]
    pub api_key: Option<String>,

    /// File containing the API key
    #[arg(long)]
    pub api_key_file: Option<PathBuf>,

    /// API base (default: env BF_API_BASE, then the public BookFusion API)
    #[arg(long)]
    pub api_base: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Calibre metadata.opf to take metadata from; flags override its values
    #[arg(long)]
    pub opf: Option<PathBuf>,

    /// Title (default: filename stem)
    #[arg(long)]
    pub title: Option<String>,

    /// Description/summary
    #[arg(long)]
    pub summary: Option<String>,

    /// Language code (e.g., eng)
    #[arg(long = "lang")]
    pub language: Option<String>,

    #[arg(long)]
    pub isbn: Option<String>,

    /// Publication date YYYY-MM-DD
    #[arg(long)]
    pub issued_on: Option<String>,

    /// Repeatable. Example: 'My Series:1' or 'My Series'
    #[arg(long, value_name = "TITLE[:INDEX]")]
    pub series: Vec<SeriesEntry>,

    /// Repeatable.
    #[arg(long = "author")]
    pub authors: Vec<String>,

    /// Repeatable; comma-separated values are split.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Repeatable. If any provided, the bookshelves array is sent.
    #[arg(long = "shelf")]
    pub shelves: Vec<String>,

    /// Path to cover image to attach
    #[arg(long)]
    pub cover: Option<PathBuf>,

    /// Verbose logs
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn client_config(&self) -> Result<ClientConfig> {
        let api_key = ApiKey::resolve(self.api_key.as_deref(), self.api_key_file.as_deref())?;
        let config = ClientConfig::new(ClientConfig::resolve_api_base(self.api_base.as_deref()), api_key);

        Ok(match self.timeout {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => config,
        })
    }

    /// Build the metadata record and cover path from the OPF file and flags
    pub fn metadata(&self) -> Result<(MetadataRecord, Option<PathBuf>)> {
        let stem = self
            .file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (mut record, opf_cover) = match &self.opf {
            Some(opf) => {
                let calibre = CalibreMetadata::load(opf)?;
                let cover = calibre.cover_path(opf);
                (calibre.into_record(&stem), cover)
            }
            None => (MetadataRecord::new(stem), None),
        };

        overlay(&mut record.title, &self.title);
        overlay_optional(&mut record.summary, &self.summary);
        overlay_optional(&mut record.language, &self.language);
        overlay_optional(&mut record.isbn, &self.isbn);
        overlay_optional(&mut record.issued_on, &self.issued_on);

        if !self.series.is_empty() {
            record.series = self.series.clone();
        }
        if !self.authors.is_empty() {
            record.author_list = self.authors.clone();
        }
        if !self.tags.is_empty() {
            record.tag_list = split_tags(&self.tags);
        }
        if !self.shelves.is_empty() {
            record.bookshelves = Some(self.shelves.clone());
        }

        let cover = self.cover.clone().or(opf_cover);
        Ok((record, cover))
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

fn overlay(field: &mut String, flag: &Option<String>) {
    if let Some(value) = flag.as_deref().filter(|v| !v.is_empty()) {
        *field = value.to_string();
    }
}

fn overlay_optional(field: &mut Option<String>, flag: &Option<String>) {
    if let Some(value) = flag.as_deref().filter(|v| !v.is_empty()) {
        *field = Some(value.to_string());
    }
}

/// `--tag "a, b" --tag c` becomes `["a", "b", "c"]`
fn split_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .flat_map(|tag| tag.split(','))
        .map(|tag| tag.trim().to_string())
        .collect()
}
