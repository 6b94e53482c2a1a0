//! The page tree for the Orbit engine.
//!
//! Models the rendered site as a hierarchy keyed by URL. The tree is built
//! bottom-up from rendered output ([`HtmlMetaData`] scraping), persisted
//! as nested JSON ([`PageTree::save`]/[`PageTree::restore`]), and rendered
//! into navigation menus ([`MenuRenderer`]). Whenever folding a page in
//! changes menu-relevant metadata the tree raises the
//! another-rendering-pass flag so already rendered pages can be brought up
//! to date.

mod html_meta;
mod menu;
mod tree;

pub use html_meta::{Headline, HtmlMetaData, MetaError};
pub use menu::{MenuRenderer, NavMenuRenderer};
pub use tree::{Node, PageTree, TreeError};
