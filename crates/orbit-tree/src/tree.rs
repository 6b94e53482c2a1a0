//! The page tree.
//!
//! A hierarchical model of the rendered site, built bottom-up: every time
//! a page is rendered its output is scraped for metadata and folded into
//! the tree. Nodes live in a flat arena with parent/children index links;
//! a url index gives O(1) parent lookup on insert.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use orbit_source::{clean_order, strip_page_ending, to_output_relative, to_url, url_level};
use serde::{Deserialize, Serialize};

use crate::html_meta::{Headline, HtmlMetaData, MetaError};

/// Page tree error.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Rendered output could not be read for metadata.
    #[error(transparent)]
    Meta(#[from] MetaError),
    /// A page has no parent node in the tree.
    #[error("no parent page in the tree for {url}")]
    OrphanPage {
        /// URL of the orphaned page.
        url: String,
    },
    /// The persisted tree file could not be read or written.
    #[error("failed to access page tree file {}: {source}", path.display())]
    DataFile {
        /// The tree data file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The persisted tree file is not valid JSON.
    #[error("invalid page tree data: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One page in the tree.
#[derive(Clone, Debug)]
pub struct Node {
    /// URL the page is served at.
    pub url: String,
    /// Nesting depth; the root is level 0.
    pub level: usize,
    /// Text for the page's menu entry.
    pub menu_link_text: String,
    /// `<title>` of the rendered page.
    pub title: Option<String>,
    /// First `<h1>` of the rendered page.
    pub h1: Option<String>,
    /// Headings with id anchors.
    pub headlines_with_id: Vec<Headline>,
    /// Output file path relative to the output directory.
    pub output_relative_file_path: String,
    /// Source file path relative to the docs directory.
    pub source_relative_file_path: String,
    /// Explicit menu order, if any.
    pub order: Option<i64>,
    /// Excluded from menus.
    pub exclude: bool,
    /// Transient: this is the page currently being rendered.
    pub current: bool,
    /// Transient: ancestor of the current page.
    pub active: bool,
    parent: Option<usize>,
    children: Vec<usize>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// On-disk shape of a node; nested, stable key order.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedNode {
    url: String,
    level: usize,
    menu_link_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    h1: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    headlines_with_id: Vec<Headline>,
    output_relative_file_path: String,
    source_relative_file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<i64>,
    #[serde(default, rename = "menuExclude", skip_serializing_if = "is_false")]
    exclude: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<PersistedNode>,
}

/// Hierarchical page tree with JSON persistence.
pub struct PageTree {
    output_dir: PathBuf,
    data_file: PathBuf,
    nodes: Vec<Node>,
    root: Option<usize>,
    url_index: HashMap<String, usize>,
    source_index: HashMap<String, usize>,
    needs_another_pass: bool,
    changed_on_save: bool,
}

impl PageTree {
    /// Create an empty tree.
    ///
    /// `output_dir` is where rendered pages live; `data_file` is the
    /// absolute path of the persisted tree JSON.
    pub fn new(output_dir: impl Into<PathBuf>, data_file: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            data_file: data_file.into(),
            nodes: Vec::new(),
            root: None,
            url_index: HashMap::new(),
            source_index: HashMap::new(),
            needs_another_pass: false,
            changed_on_save: false,
        }
    }

    /// Whether the tree has no pages yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Index of the root node, if any.
    #[must_use]
    pub fn root_index(&self) -> Option<usize> {
        self.root
    }

    /// Node by arena index.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Child indices of a node, in insertion order.
    #[must_use]
    pub fn children_of(&self, index: usize) -> &[usize] {
        self.nodes.get(index).map_or(&[], |node| node.children.as_slice())
    }

    /// Fold a rendered page into the tree.
    ///
    /// Reads the page's rendered output, extracts metadata and either
    /// updates the existing node in place or inserts a new one under its
    /// parent. Either way, if anything menu-relevant changed the
    /// another-rendering-pass flag is raised.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Meta`] if the rendered output cannot be read
    /// and [`TreeError::OrphanPage`] if no parent node exists.
    pub fn add(&mut self, source_relative_path: &Path) -> Result<(), TreeError> {
        let output_relative = to_output_relative(source_relative_path);
        if output_relative.file_name().and_then(|n| n.to_str()) != Some("index.html") {
            tracing::debug!(
                path = %source_relative_path.display(),
                "output is not an index document; not part of the tree"
            );
            return Ok(());
        }

        let meta = HtmlMetaData::from_file(&self.output_dir.join(&output_relative))?;

        let url = to_url(source_relative_path);
        let level = url_level(&output_relative);
        let file_name = source_relative_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let file_name = clean_order(strip_page_ending(file_name).unwrap_or(file_name));
        let menu_link_text = meta.link_text(file_name);
        let source_key = path_key(source_relative_path);
        let output_key = path_key(&output_relative);

        if let Some(&index) = self.source_index.get(&source_key) {
            let node = &mut self.nodes[index];
            // Children and headlines do not influence other pages' menus.
            let changed = node.url != url
                || node.level != level
                || node.menu_link_text != menu_link_text
                || node.title != meta.title
                || node.h1 != meta.h1
                || node.output_relative_file_path != output_key
                || node.order != meta.order;
            node.menu_link_text = menu_link_text;
            node.title = meta.title;
            node.h1 = meta.h1;
            node.headlines_with_id = meta.headlines_with_id;
            node.order = meta.order;
            node.exclude = meta.exclude;
            if changed {
                self.needs_another_pass = true;
            }
            return Ok(());
        }

        let mut node = Node {
            url: url.clone(),
            level,
            menu_link_text,
            title: meta.title,
            h1: meta.h1,
            headlines_with_id: meta.headlines_with_id,
            output_relative_file_path: output_key,
            source_relative_file_path: source_key.clone(),
            order: meta.order,
            exclude: meta.exclude,
            current: false,
            active: false,
            parent: None,
            children: Vec::new(),
        };

        let index = self.nodes.len();
        if self.root.is_none() {
            self.root = Some(index);
        } else {
            let parent = parent_url(&url)
                .and_then(|parent_url| self.url_index.get(&parent_url).copied())
                .filter(|&parent| self.nodes[parent].level + 1 == level)
                .ok_or_else(|| TreeError::OrphanPage { url: url.clone() })?;
            node.parent = Some(parent);
            self.nodes[parent].children.push(index);
        }

        self.nodes.push(node);
        self.url_index.insert(url, index);
        self.source_index.insert(source_key, index);
        self.needs_another_pass = true;
        Ok(())
    }

    /// Persist the tree, writing only if the serialized bytes differ from
    /// what is on disk.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DataFile`] if the file cannot be written.
    pub fn save(&mut self) -> Result<(), TreeError> {
        let persisted = self.root.map(|index| self.persist_node(index));
        let mut json = serde_json::to_string_pretty(&persisted)?;
        json.push('\n');

        if fs::read_to_string(&self.data_file).ok().as_deref() == Some(json.as_str()) {
            self.changed_on_save = false;
            return Ok(());
        }

        fs::write(&self.data_file, json).map_err(|source| TreeError::DataFile {
            path: self.data_file.clone(),
            source,
        })?;
        self.changed_on_save = true;
        Ok(())
    }

    /// Whether the last [`save`](Self::save) actually wrote the file.
    #[must_use]
    pub fn changed_on_save(&self) -> bool {
        self.changed_on_save
    }

    /// Load the tree from its data file. A missing file leaves the tree
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DataFile`] if the file exists but cannot be
    /// read, [`TreeError::Serde`] if it is not valid tree JSON.
    pub fn restore(&mut self) -> Result<(), TreeError> {
        if !self.data_file.exists() {
            return Ok(());
        }
        let content =
            fs::read_to_string(&self.data_file).map_err(|source| TreeError::DataFile {
                path: self.data_file.clone(),
                source,
            })?;
        let persisted: Option<PersistedNode> = serde_json::from_str(&content)?;

        self.nodes.clear();
        self.url_index.clear();
        self.source_index.clear();
        self.root = None;
        if let Some(node) = persisted {
            let root = self.restore_node(node, None);
            self.root = Some(root);
        }
        Ok(())
    }

    /// Whether an add since the last clear changed menu-relevant data.
    #[must_use]
    pub fn needs_another_rendering_pass(&self) -> bool {
        self.needs_another_pass
    }

    /// Acknowledge the pending rendering pass.
    pub fn clear_rendering_pass_flag(&mut self) {
        self.needs_another_pass = false;
    }

    /// Mark a page current and its ancestors active.
    pub fn set_current(&mut self, source_relative_path: &Path) {
        let Some(&index) = self.source_index.get(&path_key(source_relative_path)) else {
            tracing::debug!(
                path = %source_relative_path.display(),
                "page not in the tree; no current marker"
            );
            return;
        };
        self.nodes[index].current = true;
        let mut cursor = self.nodes[index].parent;
        while let Some(ancestor) = cursor {
            self.nodes[ancestor].active = true;
            cursor = self.nodes[ancestor].parent;
        }
    }

    /// Clear all current/active markers.
    pub fn remove_current(&mut self) {
        for node in &mut self.nodes {
            node.current = false;
            node.active = false;
        }
    }

    /// Render the menu as seen from one page: mark it current, render,
    /// clear the markers. An empty tree renders to an empty string.
    pub fn render_menu(
        &mut self,
        renderer: &dyn crate::menu::MenuRenderer,
        source_relative_path: &Path,
    ) -> String {
        if self.is_empty() {
            return String::new();
        }
        self.set_current(source_relative_path);
        let html = renderer.render(self);
        self.remove_current();
        html
    }

    fn persist_node(&self, index: usize) -> PersistedNode {
        let node = &self.nodes[index];
        PersistedNode {
            url: node.url.clone(),
            level: node.level,
            menu_link_text: node.menu_link_text.clone(),
            title: node.title.clone(),
            h1: node.h1.clone(),
            headlines_with_id: node.headlines_with_id.clone(),
            output_relative_file_path: node.output_relative_file_path.clone(),
            source_relative_file_path: node.source_relative_file_path.clone(),
            order: node.order,
            exclude: node.exclude,
            children: node
                .children
                .iter()
                .map(|&child| self.persist_node(child))
                .collect(),
        }
    }

    fn restore_node(&mut self, persisted: PersistedNode, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            url: persisted.url.clone(),
            level: persisted.level,
            menu_link_text: persisted.menu_link_text,
            title: persisted.title,
            h1: persisted.h1,
            headlines_with_id: persisted.headlines_with_id,
            output_relative_file_path: persisted.output_relative_file_path,
            source_relative_file_path: persisted.source_relative_file_path.clone(),
            order: persisted.order,
            exclude: persisted.exclude,
            current: false,
            active: false,
            parent,
            children: Vec::new(),
        });
        self.url_index.insert(persisted.url, index);
        self.source_index
            .insert(persisted.source_relative_file_path, index);

        for child in persisted.children {
            let child_index = self.restore_node(child, Some(index));
            self.nodes[index].children.push(child_index);
        }
        index
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// URL of the parent page: one trailing segment stripped. The root URL
/// `/` has no parent.
fn parent_url(url: &str) -> Option<String> {
    let trimmed = url.strip_suffix('/')?;
    let split = trimmed.rfind('/')?;
    Some(format!("{}/", &trimmed[..split]))
}
