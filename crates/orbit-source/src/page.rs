//! Page file parsing: front matter and include directives.
//!
//! A page file is an optional YAML front matter block delimited by `---`
//! lines, followed by the body. The body may contain include directives of
//! the form `{{ include ./relative/path }}` which are both inlined at load
//! time and counted as static dependencies.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Matches `{{ include <target> }}` directives in a page body.
static INCLUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*include\s+([^\s}]+)\s*\}\}").unwrap());

/// Error parsing a page file.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// Front matter block opened but never closed.
    #[error("unterminated front matter block")]
    UnterminatedFrontMatter,
    /// Front matter is not valid YAML.
    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
}

/// Metadata declared in a page's front matter.
///
/// Unknown keys are collected into `vars` (stringified) and cascade into
/// layout placeholders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageData {
    /// Page title.
    pub title: Option<String>,
    /// Text for the page's menu entry (`menuLinkText`).
    pub menu_link_text: Option<String>,
    /// Explicit menu ordering (`menuOrder`).
    pub menu_order: Option<i64>,
    /// Exclude the page from menus (`menuExclude`).
    pub menu_exclude: bool,
    /// Release timestamp (`releaseDateTime`), used for reverse-chronological
    /// ordering.
    pub release_date_time: Option<String>,
    /// Layout file path, relative to the page file.
    pub layout: Option<String>,
    /// Remaining front-matter keys, stringified.
    pub vars: BTreeMap<String, String>,
}

impl PageData {
    /// Parse front matter YAML into page data.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::FrontMatter`] if the block is not a YAML mapping.
    pub fn parse(yaml: &str) -> Result<Self, PageError> {
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml)?;

        let mut data = Self::default();
        for (key, value) in raw {
            match key.as_str() {
                "title" => data.title = as_string(&value),
                "menuLinkText" => data.menu_link_text = as_string(&value),
                "menuOrder" => data.menu_order = value.as_i64(),
                "menuExclude" => data.menu_exclude = value.as_bool().unwrap_or(false),
                "releaseDateTime" => data.release_date_time = as_string(&value),
                "layout" => data.layout = as_string(&value),
                _ => {
                    if let Some(s) = as_string(&value) {
                        data.vars.insert(key, s);
                    }
                }
            }
        }
        Ok(data)
    }
}

/// Convert a scalar YAML value to a string; non-scalars are dropped.
fn as_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A parsed page file: front matter data plus the raw body.
#[derive(Clone, Debug, PartialEq)]
pub struct PageFile {
    /// Parsed front matter (default if the file has none).
    pub data: PageData,
    /// Body text after the front matter block.
    pub body: String,
}

impl PageFile {
    /// Split and parse a page source into front matter and body.
    ///
    /// A front matter block must start on the first line.
    ///
    /// # Errors
    ///
    /// Returns [`PageError`] for an unterminated or invalid front matter
    /// block.
    pub fn parse(source: &str) -> Result<Self, PageError> {
        let Some(rest) = source.strip_prefix("---\n").or_else(|| {
            source.strip_prefix("---\r\n")
        }) else {
            return Ok(Self {
                data: PageData::default(),
                body: source.to_owned(),
            });
        };

        let Some(end) = rest.find("\n---").map(|i| i + 1) else {
            return Err(PageError::UnterminatedFrontMatter);
        };
        let yaml = &rest[..end];
        let body = rest[end + 3..].trim_start_matches(['\r', '\n']);

        Ok(Self {
            data: PageData::parse(yaml)?,
            body: body.to_owned(),
        })
    }
}

/// Collect include-directive targets from a page body, in order.
#[must_use]
pub fn include_targets(body: &str) -> Vec<&str> {
    INCLUDE_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replace every include directive in `body` with the content `resolve`
/// returns for its target.
///
/// # Errors
///
/// Propagates the first error `resolve` returns.
pub fn expand_includes<F, E>(body: &str, mut resolve: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<String, E>,
{
    let mut out = String::with_capacity(body.len());
    let mut last = 0;
    for caps in INCLUDE_RE.captures_iter(body) {
        let whole = caps.get(0).expect("capture 0 always present");
        let target = caps.get(1).expect("target group always present");
        out.push_str(&body[last..whole.start()]);
        out.push_str(&resolve(target.as_str())?);
        last = whole.end();
    }
    out.push_str(&body[last..]);
    Ok(out)
}
