//! Layout placeholder substitution.
//!
//! Layouts are plain HTML files with `{{ name }}` placeholders. `content`
//! receives the rendered page body; `title`, `url` and `menu` come from
//! the page data and render context; any other name resolves against the
//! page's front-matter vars first, then the cascaded directory vars.
//! Unknown placeholders substitute to the empty string.

use std::sync::LazyLock;

use orbit_source::PageData;
use regex::{Captures, Regex};

use crate::transform::RenderContext;

/// Matches single-word `{{ name }}` placeholders. Include directives have
/// a space-separated target and never match.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Substitute the page into a layout.
#[must_use]
pub fn apply_layout(
    layout: &str,
    content: &str,
    ctx: &RenderContext,
    data: &PageData,
) -> String {
    PLACEHOLDER_RE
        .replace_all(layout, |caps: &Captures| {
            let name = &caps[1];
            match name {
                "content" => content.to_owned(),
                "title" => data.title.clone().unwrap_or_default(),
                "url" => ctx.url.clone(),
                "menu" => ctx.menu_html.clone(),
                _ => data
                    .vars
                    .get(name)
                    .or_else(|| ctx.vars.get(name))
                    .cloned()
                    .unwrap_or_else(|| {
                        tracing::debug!(placeholder = name, "no value for layout placeholder");
                        String::new()
                    }),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn page_data(title: Option<&str>, vars: &[(&str, &str)]) -> PageData {
        PageData {
            title: title.map(str::to_owned),
            vars: vars
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            ..PageData::default()
        }
    }

    #[test]
    fn test_substitutes_content_and_title() {
        let ctx = RenderContext {
            url: "/about/".to_owned(),
            ..RenderContext::default()
        };
        let out = apply_layout(
            "<title>{{ title }}</title><main>{{ content }}</main> at {{ url }}",
            "<h1>About</h1>",
            &ctx,
            &page_data(Some("About"), &[]),
        );
        assert_eq!(
            out,
            "<title>About</title><main><h1>About</h1></main> at /about/"
        );
    }

    #[test]
    fn test_page_vars_win_over_cascaded_vars() {
        let mut vars = BTreeMap::new();
        vars.insert("team".to_owned(), "dir team".to_owned());
        let ctx = RenderContext {
            vars,
            ..RenderContext::default()
        };
        let out = apply_layout(
            "{{ team }}",
            "",
            &ctx,
            &page_data(None, &[("team", "page team")]),
        );
        assert_eq!(out, "page team");
    }

    #[test]
    fn test_cascaded_var_used_when_page_has_none() {
        let mut vars = BTreeMap::new();
        vars.insert("team".to_owned(), "dir team".to_owned());
        let ctx = RenderContext {
            vars,
            ..RenderContext::default()
        };
        let out = apply_layout("{{ team }}", "", &ctx, &page_data(None, &[]));
        assert_eq!(out, "dir team");
    }

    #[test]
    fn test_unknown_placeholder_becomes_empty() {
        let out = apply_layout(
            "a{{ mystery }}b",
            "",
            &RenderContext::default(),
            &PageData::default(),
        );
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_menu_placeholder() {
        let ctx = RenderContext {
            menu_html: "<nav>menu</nav>".to_owned(),
            ..RenderContext::default()
        };
        let out = apply_layout("{{ menu }}", "", &ctx, &PageData::default());
        assert_eq!(out, "<nav>menu</nav>");
    }
}
