//! The engine orchestrator.
//!
//! Ties the watcher, render worker and page tree together. `build` renders
//! the whole site once (with a single convergence pass when the tree
//! changed underneath already rendered pages); `start` switches to watch
//! mode, where batches of file changes flow through the watcher's
//! callbacks into renders, tree updates and one `Updated` event per batch.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};

use orbit_render::{RenderContext, RenderRequest, RenderWorker, TransformFactory};
use orbit_source::{to_output_relative, to_url};
use orbit_tree::{NavMenuRenderer, PageTree};
use orbit_watch::{FsEvent, Task, TaskKind, WatchCallbacks, WatchConfig, Watcher};

use crate::cascade::dir_vars;
use crate::config::EngineConfig;
use crate::error::{EngineError, error_artifact};
use crate::events::{EngineEvent, EngineEventReceiver};
use crate::gather::gather_files;
use crate::server::{ConnectionEvent, DevServer};

/// Shared engine state, reachable from the public API, the watcher
/// callbacks and dev-server handles.
struct EngineShared {
    config: EngineConfig,
    worker: RenderWorker,
    tree: Mutex<PageTree>,
    watcher: Watcher,
    /// Serializes lazy request renders against batch renders.
    render_lock: Mutex<()>,
    /// URL to absolute source path, for request handling.
    url_map: Mutex<HashMap<String, PathBuf>>,
    events: Mutex<Vec<mpsc::Sender<EngineEvent>>>,
    server: Mutex<Option<Box<dyn DevServer>>>,
}

impl EngineShared {
    fn render_context(&self, source_path: &Path) -> RenderContext {
        let relative = source_path
            .strip_prefix(&self.config.docs_dir)
            .unwrap_or(source_path)
            .to_path_buf();
        let output_relative = to_output_relative(&relative);
        let menu_html = self
            .tree
            .lock()
            .unwrap()
            .render_menu(&NavMenuRenderer, &relative);
        RenderContext {
            source_path: source_path.to_path_buf(),
            source_relative_path: relative.clone(),
            output_path: self.config.output_dir.join(&output_relative),
            output_relative_path: output_relative,
            url: to_url(&relative),
            menu_html,
            vars: dir_vars(source_path),
        }
    }

    /// Render one page to disk and fold it into the tree.
    ///
    /// A render failure is absorbed: the page's output becomes a
    /// diagnostic artifact and the artifact is what registers in the
    /// tree. Tree corruption is not absorbed.
    ///
    /// Caller holds the render lock.
    fn render_and_register(&self, source_path: &Path) -> Result<(), EngineError> {
        let context = self.render_context(source_path);
        let relative = context.source_relative_path.clone();
        let output_path = context.output_path.clone();
        let url = context.url.clone();

        if let Err(error) = self.worker.render(RenderRequest {
            context,
            write_to_disk: true,
        }) {
            tracing::warn!(
                page = %source_path.display(),
                %error,
                "render failed; writing error artifact"
            );
            write_file(&output_path, &error_artifact(&error))?;
        }

        self.tree.lock().unwrap().add(&relative)?;
        self.url_map
            .lock()
            .unwrap()
            .insert(url, source_path.to_path_buf());
        Ok(())
    }

    /// Take and clear the tree's another-pass flag.
    fn take_pass_flag(&self) -> bool {
        let mut tree = self.tree.lock().unwrap();
        let raised = tree.needs_another_rendering_pass();
        if raised {
            tree.clear_rendering_pass_flag();
        }
        raised
    }

    fn save_tree(&self) -> Result<(), EngineError> {
        self.tree.lock().unwrap().save()?;
        Ok(())
    }

    fn handle_render_task(&self, task: &Task) -> Result<(), EngineError> {
        // New pages always render (the tree needs their metadata);
        // existing pages only while someone is looking or they are still
        // actively edited. Dormant pages render lazily on request.
        let eager =
            task.kind == TaskKind::Create || task.is_open || task.active_countdown > 0;
        if !eager {
            tracing::debug!(
                page = %task.source_path.display(),
                "page is dormant; skipping eager render"
            );
            return Ok(());
        }

        let _guard = self.render_lock.lock().unwrap();
        self.render_and_register(&task.source_path)?;
        self.save_tree()?;

        if self.take_pass_flag() {
            // The tree changed: menus on already rendered open pages are
            // stale. One more pass over them with the final tree.
            for page in self.watcher.open_pages() {
                self.render_and_register(&page)?;
            }
            self.save_tree()?;
        }
        Ok(())
    }

    fn handle_delete_task(&self, task: &Task) -> Result<(), EngineError> {
        let relative = task
            .source_path
            .strip_prefix(&self.config.docs_dir)
            .unwrap_or(&task.source_path);
        let output = self.config.output_dir.join(to_output_relative(relative));

        match fs::remove_file(&output) {
            Ok(()) => {
                tracing::debug!(page = %task.source_path.display(), "removed rendered output");
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    page = %task.source_path.display(),
                    "deleted page had no rendered output"
                );
            }
            Err(source) => return Err(EngineError::Io { path: output, source }),
        }

        // Tree nodes are kept; a stale leaf is harmless and pruning
        // mid-session would orphan siblings restored from disk.
        self.url_map.lock().unwrap().remove(&to_url(relative));
        Ok(())
    }

    fn handle_batch_done(&self) {
        self.emit(EngineEvent::Updated);
        if let Some(server) = self.server.lock().unwrap().as_mut() {
            server.notify_updated();
        }
    }

    fn emit(&self, event: EngineEvent) {
        self.events
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event).is_ok());
    }

    fn subscribe(&self) -> EngineEventReceiver {
        let (tx, rx) = mpsc::channel();
        self.events.lock().unwrap().push(tx);
        EngineEventReceiver::new(rx)
    }

    fn on_request(&self, url: &str) -> Option<String> {
        let source = self.url_map.lock().unwrap().get(url).cloned()?;
        let _guard = self.render_lock.lock().unwrap();

        let context = self.render_context(&source);
        let relative = context.source_relative_path.clone();
        let output_path = context.output_path.clone();

        match self.worker.render(RenderRequest {
            context,
            write_to_disk: true,
        }) {
            Ok(result) => {
                let mut tree = self.tree.lock().unwrap();
                if let Err(error) = tree.add(&relative).and_then(|()| tree.save()) {
                    tracing::warn!(url, %error, "could not register requested page");
                }
                Some(result.content)
            }
            Err(error) => {
                tracing::warn!(url, %error, "request render failed");
                let artifact = error_artifact(&error);
                if let Err(error) = write_file(&output_path, &artifact) {
                    tracing::warn!(url, %error, "could not write error artifact");
                }
                Some(artifact)
            }
        }
    }

    fn on_connection(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened { id, source_path } => {
                if let Err(error) = self.watcher.add_subscriber(&source_path, id) {
                    tracing::warn!(%error, "connection on unknown page");
                }
            }
            ConnectionEvent::Closed { id } => self.watcher.remove_subscriber(id),
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The Orbit engine.
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Engine {
    /// Create an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Watch`] if an ignore pattern is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::build_engine(config, None)
    }

    /// Create an engine whose render worker runs the given transforms
    /// after the built-in ones.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Watch`] if an ignore pattern is invalid.
    pub fn with_transforms(
        config: EngineConfig,
        transforms: TransformFactory,
    ) -> Result<Self, EngineError> {
        Self::build_engine(config, Some(transforms))
    }

    fn build_engine(
        config: EngineConfig,
        transforms: Option<TransformFactory>,
    ) -> Result<Self, EngineError> {
        let watcher = Watcher::new(WatchConfig {
            debounce: config.debounce,
            ignore: config.ignore.clone(),
            generated_files: vec![config.tree_data_file()],
        })?;
        let tree = PageTree::new(&config.output_dir, config.tree_data_file());
        let worker = match transforms {
            Some(factory) => RenderWorker::with_transforms(factory),
            None => RenderWorker::new(),
        };

        Ok(Self {
            shared: Arc::new(EngineShared {
                config,
                worker,
                tree: Mutex::new(tree),
                watcher,
                render_lock: Mutex::new(()),
                url_map: Mutex::new(HashMap::new()),
                events: Mutex::new(Vec::new()),
                server: Mutex::new(None),
            }),
        })
    }

    /// Render the whole site once.
    ///
    /// Pages render in parents-first order; when the finished tree
    /// differs from the one the early pages saw, every page renders
    /// exactly once more with the final tree.
    ///
    /// # Errors
    ///
    /// Render failures are absorbed into error artifacts; tree
    /// corruption ([`orbit_tree::TreeError::OrphanPage`]) and I/O
    /// failures abort the build.
    pub fn build(&self) -> Result<(), EngineError> {
        let shared = &self.shared;
        fs::create_dir_all(&shared.config.output_dir).map_err(|source| EngineError::Io {
            path: shared.config.output_dir.clone(),
            source,
        })?;
        let files = gather_files(&shared.config.docs_dir)?;
        tracing::info!(pages = files.len(), "building site");

        let _guard = shared.render_lock.lock().unwrap();
        for file in &files {
            shared.render_and_register(file)?;
        }
        shared.save_tree()?;

        if shared.take_pass_flag() {
            tracing::debug!("page tree changed during build; rendering one more pass");
            for file in &files {
                shared.render_and_register(file)?;
            }
            shared.save_tree()?;
            // The second pass converged; adds may have re-raised the flag
            // for nodes inserted during it.
            shared.tree.lock().unwrap().clear_rendering_pass_flag();
        }

        shared.worker.shutdown();
        Ok(())
    }

    /// Enter watch mode.
    ///
    /// Restores the persisted tree, registers the existing pages with the
    /// watcher, wires the batch callbacks and starts the dev server.
    ///
    /// # Errors
    ///
    /// Returns the first setup failure; the engine is not watching
    /// afterwards.
    pub fn start(&self, mut dev_server: Box<dyn DevServer>) -> Result<(), EngineError> {
        let shared = &self.shared;
        fs::create_dir_all(&shared.config.output_dir).map_err(|source| EngineError::Io {
            path: shared.config.output_dir.clone(),
            source,
        })?;
        shared.tree.lock().unwrap().restore()?;

        let files = gather_files(&shared.config.docs_dir)?;
        {
            let mut url_map = shared.url_map.lock().unwrap();
            for file in &files {
                let relative = file.strip_prefix(&shared.config.docs_dir).unwrap_or(file);
                url_map.insert(to_url(relative), file.clone());
            }
        }
        shared.watcher.register_known_pages(files);

        let on_render = Arc::clone(shared);
        let on_delete = Arc::clone(shared);
        let on_done = Arc::clone(shared);
        shared.watcher.set_callbacks(WatchCallbacks {
            on_render_needed: Box::new(move |task| {
                on_render.handle_render_task(task).map_err(Into::into)
            }),
            on_delete_needed: Box::new(move |task| {
                on_delete.handle_delete_task(task).map_err(Into::into)
            }),
            on_batch_done: Box::new(move || on_done.handle_batch_done()),
        });
        shared.watcher.initialize(&shared.config.docs_dir)?;

        dev_server
            .start(self.handle())
            .map_err(EngineError::Server)?;
        *shared.server.lock().unwrap() = Some(dev_server);

        tracing::info!(docs = %shared.config.docs_dir.display(), "watching");
        Ok(())
    }

    /// A cheap, cloneable door into the running engine.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> EngineEventReceiver {
        self.shared.subscribe()
    }

    /// Feed one debounced event group through the watcher and drain the
    /// resulting batch synchronously. For embedders (and tests) driving
    /// their own notification source.
    pub fn process_events(&self, events: &[FsEvent]) {
        self.shared.watcher.process_events(events);
    }

    /// Stop watching, the worker and the dev server. Idempotent.
    pub fn cleanup(&self) {
        self.shared.watcher.cleanup();
        self.shared.worker.shutdown();
        if let Some(mut server) = self.shared.server.lock().unwrap().take() {
            server.stop();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Cloneable handle dev servers use to reach the engine.
pub struct EngineHandle {
    shared: Arc<EngineShared>,
}

impl Clone for EngineHandle {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl EngineHandle {
    /// Render the page served at `url` on demand.
    ///
    /// The page renders with the current tree, is written to disk and
    /// registered into the tree regardless of whether anyone subscribes
    /// to it. Returns `None` for URLs that are not pages; a failing
    /// render returns the diagnostic artifact.
    #[must_use]
    pub fn on_request(&self, url: &str) -> Option<String> {
        self.shared.on_request(url)
    }

    /// Report a live connection opening on or leaving a page.
    pub fn on_connection(&self, event: ConnectionEvent) {
        self.shared.on_connection(event);
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> EngineEventReceiver {
        self.shared.subscribe()
    }
}
