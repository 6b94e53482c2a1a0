//! Menu rendering from the page tree.

use crate::tree::{Node, PageTree};

/// Renders a navigation menu from the tree.
///
/// Implementations see the tree with current/active markers already set
/// for the page the menu is rendered for.
pub trait MenuRenderer {
    /// Render the menu HTML.
    fn render(&self, tree: &PageTree) -> String;
}

/// Default site menu: a `<nav aria-label="site">` with nested lists,
/// `aria-current="page"` on the current page. Children are ordered by
/// their explicit menu order first, insertion order otherwise; excluded
/// pages are skipped with their subtrees.
pub struct NavMenuRenderer;

impl MenuRenderer for NavMenuRenderer {
    fn render(&self, tree: &PageTree) -> String {
        let Some(root) = tree.root_index() else {
            return String::new();
        };
        let mut out = String::from(r#"<nav aria-label="site">"#);
        render_list(tree, &[root], &mut out);
        out.push_str("</nav>");
        out
    }
}

fn render_list(tree: &PageTree, indices: &[usize], out: &mut String) {
    let mut entries: Vec<(usize, &Node)> = indices
        .iter()
        .filter_map(|&index| tree.node(index).map(|node| (index, node)))
        .filter(|(_, node)| !node.exclude)
        .collect();
    if entries.is_empty() {
        return;
    }
    entries.sort_by_key(|(_, node)| node.order.unwrap_or(i64::MAX));

    out.push_str("<ul>");
    for (index, node) in entries {
        out.push_str("<li>");
        out.push_str(r#"<a href=""#);
        out.push_str(&escape(&node.url));
        out.push('"');
        if node.current {
            out.push_str(r#" aria-current="page""#);
        }
        out.push('>');
        out.push_str(&escape(&node.menu_link_text));
        out.push_str("</a>");
        render_list(tree, tree.children_of(index), out);
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"a & <b> "c""#), "a &amp; &lt;b&gt; &quot;c&quot;");
    }
}
