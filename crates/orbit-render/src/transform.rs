//! Post-render content transforms.
//!
//! Transforms run after layout application, in registration order, each
//! receiving the previous one's output. The built-in [`AssetUrlRewriter`]
//! always runs first.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use orbit_source::normalize;
use regex::{Captures, Regex};

use crate::error::TransformError;

/// Everything a render knows about the page being rendered.
#[derive(Clone, Debug, Default)]
pub struct RenderContext {
    /// Absolute path of the page source file.
    pub source_path: PathBuf,
    /// Page source path relative to the docs directory.
    pub source_relative_path: PathBuf,
    /// Absolute path the rendered output is written to.
    pub output_path: PathBuf,
    /// Output path relative to the output directory.
    pub output_relative_path: PathBuf,
    /// URL the page is served at.
    pub url: String,
    /// Menu HTML rendered for this page, empty if there is no tree yet.
    pub menu_html: String,
    /// Directory-level cascaded vars; the page's own front matter wins
    /// over these.
    pub vars: BTreeMap<String, String>,
}

/// A content transform applied to rendered HTML.
pub trait Transform: Send {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Transform `content`, returning the replacement.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the render fails with
    /// [`RenderError::Transform`](crate::RenderError::Transform).
    fn apply(&self, content: &str, ctx: &RenderContext) -> Result<String, TransformError>;
}

static ATTR_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b(src|href)="([^"]*)""#).unwrap());

/// Rewrites relative asset URLs from source-relative to output-relative.
///
/// Authors reference assets relative to the page source file; the rendered
/// page lives at a different depth in the output tree, so those references
/// are re-based onto the output location. Absolute URLs, fragments,
/// protocol URLs and page links are left alone.
pub struct AssetUrlRewriter;

impl Transform for AssetUrlRewriter {
    fn name(&self) -> &str {
        "asset-urls"
    }

    fn apply(&self, content: &str, ctx: &RenderContext) -> Result<String, TransformError> {
        let source_dir = parent_or_empty(&ctx.source_relative_path);
        let output_dir = parent_or_empty(&ctx.output_relative_path);

        let rewritten = ATTR_URL_RE.replace_all(content, |caps: &Captures| {
            let attr = &caps[1];
            let value = &caps[2];
            if !is_relative_asset(value) {
                return caps[0].to_owned();
            }
            let asset = normalize(&source_dir.join(value));
            let rebased = relative_from(&output_dir, &asset);
            format!(r#"{attr}="{}""#, rebased.display())
        });
        Ok(rewritten.into_owned())
    }
}

fn parent_or_empty(path: &Path) -> PathBuf {
    path.parent().map_or_else(PathBuf::new, Path::to_path_buf)
}

/// Whether an attribute value is a relative reference to an asset file.
fn is_relative_asset(value: &str) -> bool {
    if value.is_empty()
        || value.starts_with('/')
        || value.starts_with('#')
        || value.starts_with("//")
        || value.contains("://")
        || value.starts_with("mailto:")
        || value.starts_with("data:")
        || value.ends_with('/')
    {
        return false;
    }
    // Page links keep their author-written form; only files with a
    // non-HTML extension count as assets.
    let last = value.rsplit('/').next().unwrap_or(value);
    match last.rsplit_once('.') {
        Some((_, ext)) => !ext.eq_ignore_ascii_case("html"),
        None => false,
    }
}

/// Lexical relative path from `base_dir` to `target`, both relative to the
/// same root.
fn relative_from(base_dir: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base_dir.components().collect();
    let target_components: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(target_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target_components[common..] {
        out.push(component);
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn context(source_relative: &str, output_relative: &str) -> RenderContext {
        RenderContext {
            source_relative_path: PathBuf::from(source_relative),
            output_relative_path: PathBuf::from(output_relative),
            ..RenderContext::default()
        }
    }

    #[test]
    fn test_rewrites_relative_img_src() {
        let ctx = context("guide/setup.page.md", "guide/setup/index.html");
        let html = r#"<img src="./images/flow.png" alt="">"#;

        let out = AssetUrlRewriter.apply(html, &ctx).unwrap();

        assert_eq!(out, r#"<img src="../images/flow.png" alt="">"#);
    }

    #[test]
    fn test_rewrites_parent_relative_asset() {
        let ctx = context("guide/setup.page.md", "guide/setup/index.html");
        let html = r#"<link href="../shared/site.css">"#;

        let out = AssetUrlRewriter.apply(html, &ctx).unwrap();

        assert_eq!(out, r#"<link href="../../shared/site.css">"#);
    }

    #[test]
    fn test_root_page_asset_moves_down() {
        // index.page.md renders to index.html at the same depth.
        let ctx = context("index.page.md", "index.html");
        let html = r#"<img src="./logo.svg">"#;

        let out = AssetUrlRewriter.apply(html, &ctx).unwrap();

        assert_eq!(out, r#"<img src="logo.svg">"#);
    }

    #[test]
    fn test_leaves_absolute_and_external_urls_alone() {
        let ctx = context("guide/setup.page.md", "guide/setup/index.html");
        let html = concat!(
            r#"<img src="/static/a.png">"#,
            r#"<a href="https://example.org/x.png">x</a>"#,
            r##"<a href="#section">s</a>"##,
            r#"<a href="../other/">o</a>"#,
        );

        let out = AssetUrlRewriter.apply(html, &ctx).unwrap();

        assert_eq!(out, html);
    }

    #[test]
    fn test_leaves_page_links_alone() {
        let ctx = context("guide/setup.page.md", "guide/setup/index.html");
        let html = r#"<a href="./other.html">other</a>"#;

        let out = AssetUrlRewriter.apply(html, &ctx).unwrap();

        assert_eq!(out, html);
    }

    #[test]
    fn test_relative_from() {
        assert_eq!(
            relative_from(Path::new("guide/setup"), Path::new("guide/images/a.png")),
            PathBuf::from("../images/a.png")
        );
        assert_eq!(
            relative_from(Path::new(""), Path::new("logo.svg")),
            PathBuf::from("logo.svg")
        );
        assert_eq!(
            relative_from(Path::new("a/b"), Path::new("a/b/c.png")),
            PathBuf::from("c.png")
        );
    }
}
