//! Metadata extraction from rendered HTML.
//!
//! The tree never looks at page sources; everything it knows about a page
//! is scraped from the rendered output: `<title>`, the first `<h1>`,
//! headings carrying ids, and `<meta name="menu:...">` tags pages emit
//! through their layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap());
static HEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<h([1-6])[^>]*\bid="([^"]*)"[^>]*>(.*?)</h[1-6]>"#).unwrap()
});
static MENU_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+name="menu:([^"]+)"\s+content="([^"]*)"\s*/?>"#).unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Error reading rendered output for metadata extraction.
#[derive(Debug, thiserror::Error)]
#[error("failed to read rendered output {}: {source}", path.display())]
pub struct MetaError {
    /// Path that failed.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// A heading with an id anchor, as found in rendered output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    /// Heading text, tags stripped.
    pub text: String,
    /// The id attribute.
    pub id: String,
    /// Heading level, 1-6.
    pub level: u8,
}

/// Metadata scraped from one rendered HTML document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HtmlMetaData {
    /// `<title>` text.
    pub title: Option<String>,
    /// First `<h1>` text, tags stripped.
    pub h1: Option<String>,
    /// `<meta name="menu:link.text">` content.
    pub menu_link_text: Option<String>,
    /// `<meta name="menu:order">` content, or a negative order derived
    /// from the release timestamp.
    pub order: Option<i64>,
    /// `<meta name="menu:exclude">` is present and truthy.
    pub exclude: bool,
    /// `<meta name="menu:page.releaseDateTime">` content.
    pub release_date_time: Option<String>,
    /// All headings carrying an id, in document order.
    pub headlines_with_id: Vec<Headline>,
}

impl HtmlMetaData {
    /// Read a rendered output file and extract its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MetaError`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, MetaError> {
        let html = fs::read_to_string(path).map_err(|source| MetaError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&html))
    }

    /// Extract metadata from rendered HTML.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let mut meta = Self {
            title: TITLE_RE
                .captures(html)
                .map(|caps| strip_tags(&caps[1])),
            h1: H1_RE.captures(html).map(|caps| strip_tags(&caps[1])),
            ..Self::default()
        };

        for caps in MENU_META_RE.captures_iter(html) {
            let content = caps[2].to_owned();
            match &caps[1] {
                "link.text" => meta.menu_link_text = Some(content),
                "order" => meta.order = content.parse().ok(),
                "exclude" => meta.exclude = content != "false",
                "page.releaseDateTime" => {
                    // Newest release sorts first: the timestamp maps to a
                    // negative order.
                    meta.order = timestamp_order(&content);
                    meta.release_date_time = Some(content);
                }
                other => {
                    tracing::debug!(name = other, "unrecognized menu meta tag");
                }
            }
        }

        for caps in HEADLINE_RE.captures_iter(html) {
            let level = caps[1].parse().unwrap_or(6);
            meta.headlines_with_id.push(Headline {
                text: strip_tags(&caps[3]),
                id: caps[2].to_owned(),
                level,
            });
        }

        meta
    }

    /// The menu link text with its fallback chain: explicit meta tag,
    /// first h1, title, then the page's file name.
    #[must_use]
    pub fn link_text(&self, file_name: &str) -> String {
        self.menu_link_text
            .clone()
            .or_else(|| self.h1.clone())
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| file_name.to_owned())
    }
}

fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").trim().to_owned()
}

/// Map an ISO-like timestamp to a negative order key.
///
/// The digits of the timestamp are concatenated (at most 14, enough for
/// second precision) and negated, so a later timestamp gives a smaller
/// order and sorts first.
fn timestamp_order(timestamp: &str) -> Option<i64> {
    let digits: String = timestamp
        .chars()
        .filter(char::is_ascii_digit)
        .take(14)
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| -n)
}
