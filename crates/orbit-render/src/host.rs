//! Module host: loads page files with include expansion and caches them.
//!
//! The host is the worker's unit of isolation. Everything loaded during a
//! render generation goes through one host; swapping the host for a new
//! one drops the whole cache at once, which is how repeat renders observe
//! edited files.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use orbit_source::{PageData, PageFile, expand_includes, normalize};

use crate::error::RenderError;

/// A page or partial loaded into the host.
#[derive(Debug)]
pub struct LoadedModule {
    /// Front matter data (default if the file has none).
    pub data: PageData,
    /// Body with every include directive expanded.
    pub content: String,
}

/// Caching loader for page files and their includes.
#[derive(Default)]
pub struct ModuleHost {
    cache: HashMap<PathBuf, Arc<LoadedModule>>,
    /// Paths on the current load chain, for cycle detection.
    loading: HashSet<PathBuf>,
}

impl ModuleHost {
    /// Create an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a file, expanding includes recursively through this host's
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] or [`RenderError::Parse`] if the file or
    /// one of its includes cannot be loaded, and
    /// [`RenderError::IncludeCycle`] if the include chain loops.
    pub fn load(&mut self, path: &Path) -> Result<Arc<LoadedModule>, RenderError> {
        let path = normalize(path);
        if let Some(module) = self.cache.get(&path) {
            return Ok(Arc::clone(module));
        }

        if !self.loading.insert(path.clone()) {
            return Err(RenderError::IncludeCycle { path });
        }
        let loaded = self.load_uncached(&path);
        self.loading.remove(&path);

        let module = Arc::new(loaded?);
        self.cache.insert(path, Arc::clone(&module));
        Ok(module)
    }

    fn load_uncached(&mut self, path: &Path) -> Result<LoadedModule, RenderError> {
        let source = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let page = PageFile::parse(&source).map_err(|source| RenderError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let content = expand_includes(&page.body, |target| {
            let resolved = dir.join(target);
            self.load(&resolved).map(|module| module.content.clone())
        })?;

        Ok(LoadedModule {
            data: page.data,
            content,
        })
    }
}
