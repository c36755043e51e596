//! Metadata record types

use std::fmt;
use std::str::FromStr;

/// Bibliographic description sent alongside an uploaded book.
///
/// List order is significant everywhere: it feeds both the metadata digest
/// and the order of the repeated finalize parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    pub title: String,
    pub summary: Option<String>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    /// Publication date, usually `YYYY-MM-DD`
    pub issued_on: Option<String>,
    pub series: Vec<SeriesEntry>,
    pub author_list: Vec<String>,
    pub tag_list: Vec<String>,
    /// `None` sends no shelves at all; `Some(vec![])` still sends the
    /// empty array marker on finalize.
    pub bookshelves: Option<Vec<String>>,
}

impl MetadataRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Scalar fields in wire order, paired with their form field names
    pub fn scalars(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("title", Some(self.title.as_str())),
            ("summary", self.summary.as_deref()),
            ("language", self.language.as_deref()),
            ("isbn", self.isbn.as_deref()),
            ("issued_on", self.issued_on.as_deref()),
        ]
    }
}

/// One series membership of a book
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub title: String,
    pub index: Option<SeriesIndex>,
}

impl SeriesEntry {
    pub fn new(title: impl Into<String>, index: Option<SeriesIndex>) -> Self {
        Self {
            title: title.into(),
            index,
        }
    }
}

impl FromStr for SeriesEntry {
    type Err = std::convert::Infallible;

    /// Parse `TITLE[:INDEX]`, splitting on the first colon
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once(':') {
            Some((title, index)) => Self::new(title, Some(SeriesIndex::parse(index))),
            None => Self::new(s, None),
        })
    }
}

/// Position of a book within a series
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesIndex {
    Integer(i64),
    Fractional(f64),
    /// Anything that is not a number is kept verbatim
    Text(String),
}

impl SeriesIndex {
    /// An index containing `.` is fractional, otherwise integral.
    ///
    /// Single underscores between digits are accepted as separators
    /// (`1_000`). Integers too large for `i64` keep their canonical digits;
    /// anything else that fails to parse is kept verbatim as text. Only
    /// ASCII digits are recognized.
    pub fn parse(raw: &str) -> Self {
        let Some(number) = strip_digit_separators(raw.trim()) else {
            return Self::Text(raw.to_string());
        };

        let parsed = if number.contains('.') {
            number.parse::<f64>().ok().map(Self::Fractional)
        } else {
            number
                .parse::<i64>()
                .ok()
                .map(Self::Integer)
                .or_else(|| canonical_integer(&number).map(Self::Text))
        };
        parsed.unwrap_or_else(|| Self::Text(raw.to_string()))
    }
}

/// Drop `_` separators that sit between two ASCII digits; any other
/// underscore makes the input unparseable.
fn strip_digit_separators(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());

    for (i, c) in s.char_indices() {
        if c != '_' {
            out.push(c);
            continue;
        }
        let before = i.checked_sub(1).map(|j| bytes[j]);
        let after = bytes.get(i + 1).copied();
        if !(before.is_some_and(|b| b.is_ascii_digit()) && after.is_some_and(|b| b.is_ascii_digit())) {
            return None;
        }
    }
    Some(out)
}

/// `[+-]digits` without a `+` sign or leading zeros, for integers past `i64`
fn canonical_integer(s: &str) -> Option<String> {
    let (sign, digits) = match s.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", s.strip_prefix('+').unwrap_or(s)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');
    Some(format!("{sign}{digits}"))
}

impl fmt::Display for SeriesIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Fractional(value) => f.write_str(&render_fractional(*value)),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Shortest round-trip decimal that always carries a decimal point or an
/// exponent (`2.0`, `1.5`, `1e+16`, `1e-05`).
fn render_fractional(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Debug keeps the ".0" and switches to exponent form outside 1e-4..1e16
    let debug = format!("{value:?}");
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => debug,
    }
}
