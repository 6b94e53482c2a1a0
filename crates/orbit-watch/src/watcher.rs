//! Dependency-aware page watcher.
//!
//! Tracks every known page together with its static dependencies and turns
//! debounced file-system events into an ordered batch of render and delete
//! tasks. While a batch is draining the watcher stops accepting events, so
//! writes performed by the render callbacks cannot re-trigger the batch
//! that produced them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use glob::Pattern;
use notify::{RecursiveMode, Watcher as _};
use orbit_source::{extract_dependencies, is_page_file};

use crate::debounce::EventDebouncer;
use crate::event::{FsEvent, FsEventKind};

/// How often the pump thread polls the debouncer for ready events.
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

/// Batches a freshly created page receives before it goes dormant.
///
/// A new page is assumed to be under active editing; it keeps rendering on
/// change for this many batches even without an open browser tab.
pub const INITIAL_ACTIVE_COUNTDOWN: u32 = 5;

/// Identifier of a live connection subscribed to a page.
pub type SubscriberId = u64;

/// Error type render and delete callbacks may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Watcher setup error.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The file-system watcher could not be attached.
    #[error("failed to attach file watcher at {}: {source}", path.display())]
    Init {
        /// Watched root.
        path: PathBuf,
        /// Underlying watcher error.
        #[source]
        source: notify::Error,
    },
    /// An ignore pattern did not compile.
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    Pattern {
        /// Offending pattern.
        pattern: String,
        /// Underlying glob error.
        #[source]
        source: glob::PatternError,
    },
    /// The page is not tracked by the watcher.
    #[error("page is not tracked: {}", .0.display())]
    UnknownPage(PathBuf),
}

/// Watcher configuration.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Quiet period before a changed path is released into a batch.
    pub debounce: Duration,
    /// Glob patterns (matched against absolute paths) that are never
    /// watched.
    pub ignore: Vec<String>,
    /// Files the engine itself writes inside the watched root; events for
    /// them are always dropped.
    pub generated_files: Vec<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            ignore: vec![
                "**/node_modules/**".to_owned(),
                "**/.git/**".to_owned(),
            ],
            generated_files: Vec::new(),
        }
    }
}

/// Kind of work queued for a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Page appeared; render it and start tracking it.
    Create,
    /// Page or one of its dependencies changed; re-render.
    Update,
    /// Page source was removed; drop its output.
    Delete,
}

/// A unit of work handed to the callbacks while a batch drains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Absolute path of the page source file.
    pub source_path: PathBuf,
    /// What to do with the page.
    pub kind: TaskKind,
    /// Whether a subscriber currently has the page open.
    pub is_open: bool,
    /// Remaining actively-edited batches, already decremented for this
    /// task.
    pub active_countdown: u32,
}

/// Callbacks invoked while a batch drains.
///
/// Errors returned by the render and delete callbacks are logged and do not
/// stop the batch; the remaining tasks still run.
pub struct WatchCallbacks {
    /// Called for every create and update task.
    pub on_render_needed: Box<dyn FnMut(&Task) -> Result<(), CallbackError> + Send>,
    /// Called for every delete task.
    pub on_delete_needed: Box<dyn FnMut(&Task) -> Result<(), CallbackError> + Send>,
    /// Called exactly once after the last task of a batch.
    pub on_batch_done: Box<dyn FnMut() + Send>,
}

/// Tracking state for one known page.
struct PageEntry {
    /// Absolute paths this page depends on, one level deep.
    dependencies: Vec<PathBuf>,
    active_countdown: u32,
    subscribers: HashSet<SubscriberId>,
}

/// Snapshot of a page taken at classification time.
#[derive(Clone)]
struct QueuedTask {
    kind: TaskKind,
    is_open: bool,
    active_countdown: u32,
}

/// Ordered task queue, at most one task per page.
#[derive(Default)]
struct TaskQueue {
    order: Vec<PathBuf>,
    map: HashMap<PathBuf, QueuedTask>,
}

impl TaskQueue {
    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn contains(&self, path: &Path) -> bool {
        self.map.contains_key(path)
    }

    fn get(&self, index: usize) -> Option<(&PathBuf, &QueuedTask)> {
        let path = self.order.get(index)?;
        let task = self.map.get(path)?;
        Some((path, task))
    }

    fn set(&mut self, path: PathBuf, task: QueuedTask) {
        if self.map.insert(path.clone(), task).is_none() {
            self.order.push(path);
        }
    }

    /// Queue a create task. Create wins over anything already queued.
    fn put_create(&mut self, path: PathBuf) {
        self.set(
            path,
            QueuedTask {
                kind: TaskKind::Create,
                is_open: false,
                active_countdown: INITIAL_ACTIVE_COUNTDOWN,
            },
        );
    }

    /// Queue an update task unless a create or delete is already queued.
    fn put_update(&mut self, path: PathBuf, is_open: bool, active_countdown: u32) {
        if let Some(existing) = self.map.get(&path)
            && existing.kind != TaskKind::Update
        {
            return;
        }
        self.set(
            path,
            QueuedTask {
                kind: TaskKind::Update,
                is_open,
                active_countdown,
            },
        );
    }

    /// Queue a delete task. Delete is terminal and wins over anything.
    fn put_delete(&mut self, path: PathBuf) {
        self.set(
            path,
            QueuedTask {
                kind: TaskKind::Delete,
                is_open: false,
                active_countdown: 0,
            },
        );
    }

    fn clear(&mut self) {
        self.order.clear();
        self.map.clear();
    }
}

/// Shared watcher state, reachable from the notify callback, the pump
/// thread and the public API.
struct Inner {
    ignore: Vec<Pattern>,
    generated_files: Vec<PathBuf>,
    /// `true` while events are accepted; `false` while a batch drains.
    accepting: AtomicBool,
    pages: Mutex<HashMap<PathBuf, PageEntry>>,
    tasks: Mutex<TaskQueue>,
    callbacks: Mutex<Option<WatchCallbacks>>,
}

impl Inner {
    fn is_ignored(&self, path: &Path) -> bool {
        self.generated_files.iter().any(|g| g == path)
            || self.ignore.iter().any(|p| p.matches_path(path))
    }

    /// Handle an event that arrived while a batch was draining.
    ///
    /// Events for paths already queued in the batch are echoes of the
    /// batch's own work and dropped silently; anything else is a real edit
    /// the user has to repeat.
    fn note_suppressed(&self, path: &Path) {
        if self.tasks.lock().unwrap().contains(path) {
            tracing::debug!(path = %path.display(), "dropping echo event while batch drains");
        } else {
            tracing::warn!(
                path = %path.display(),
                "change arrived while a batch was draining and was dropped; save again"
            );
        }
    }

    /// Classify one group of debounced events into tasks, then drain the
    /// resulting batch.
    fn process_events(&self, events: &[FsEvent]) {
        for event in events {
            self.classify(event);
        }
        if self.tasks.lock().unwrap().is_empty() {
            return;
        }

        self.accepting.store(false, Ordering::SeqCst);
        self.execute_batch();
        self.accepting.store(true, Ordering::SeqCst);
    }

    fn classify(&self, event: &FsEvent) {
        match event.kind {
            FsEventKind::Created => {
                if !is_page_file(&event.path) {
                    return;
                }
                self.tasks.lock().unwrap().put_create(event.path.clone());
            }
            FsEventKind::Modified => {
                // Fan out over every page the changed file feeds into.
                let affected: Vec<(PathBuf, bool, u32)> = {
                    let pages = self.pages.lock().unwrap();
                    pages
                        .iter()
                        .filter(|(page, entry)| {
                            **page == event.path || entry.dependencies.contains(&event.path)
                        })
                        .map(|(page, entry)| {
                            (
                                page.clone(),
                                !entry.subscribers.is_empty(),
                                entry.active_countdown,
                            )
                        })
                        .collect()
                };
                if affected.is_empty() {
                    tracing::debug!(
                        path = %event.path.display(),
                        "modified file feeds no tracked page"
                    );
                    return;
                }
                let mut tasks = self.tasks.lock().unwrap();
                for (page, is_open, active_countdown) in affected {
                    tasks.put_update(page, is_open, active_countdown);
                }
            }
            FsEventKind::Removed => {
                // Same fan-out as Modified: a page whose include or layout
                // vanished cannot render any more.
                let affected: Vec<PathBuf> = {
                    let pages = self.pages.lock().unwrap();
                    pages
                        .iter()
                        .filter(|(page, entry)| {
                            **page == event.path || entry.dependencies.contains(&event.path)
                        })
                        .map(|(page, _)| page.clone())
                        .collect()
                };
                if affected.is_empty() {
                    tracing::debug!(
                        path = %event.path.display(),
                        "removed file feeds no tracked page"
                    );
                    return;
                }
                let mut tasks = self.tasks.lock().unwrap();
                for page in affected {
                    tasks.put_delete(page);
                }
            }
        }
    }

    /// Drain the task queue in order, then signal batch completion.
    ///
    /// The queue stays populated while draining so echo events can be
    /// matched against it; it is cleared at the end.
    fn execute_batch(&self) {
        let mut callbacks = self.callbacks.lock().unwrap();
        let Some(callbacks) = callbacks.as_mut() else {
            tracing::warn!("batch ready but no callbacks are installed; dropping tasks");
            self.tasks.lock().unwrap().clear();
            return;
        };

        let mut index = 0;
        loop {
            let queued = {
                let tasks = self.tasks.lock().unwrap();
                tasks.get(index).map(|(p, t)| (p.clone(), t.clone()))
            };
            let Some((source_path, queued)) = queued else {
                break;
            };

            match queued.kind {
                TaskKind::Create => {
                    let task = Task {
                        source_path: source_path.clone(),
                        kind: TaskKind::Create,
                        is_open: false,
                        active_countdown: INITIAL_ACTIVE_COUNTDOWN,
                    };
                    if let Err(error) = (callbacks.on_render_needed)(&task) {
                        tracing::error!(page = %source_path.display(), %error, "render failed");
                    }
                    let dependencies = dependencies_or_empty(&source_path);
                    self.pages.lock().unwrap().insert(
                        source_path,
                        PageEntry {
                            dependencies,
                            active_countdown: INITIAL_ACTIVE_COUNTDOWN,
                            subscribers: HashSet::new(),
                        },
                    );
                }
                TaskKind::Update => {
                    let active_countdown = queued.active_countdown.saturating_sub(1);
                    let task = Task {
                        source_path: source_path.clone(),
                        kind: TaskKind::Update,
                        is_open: queued.is_open,
                        active_countdown,
                    };
                    if let Err(error) = (callbacks.on_render_needed)(&task) {
                        tracing::error!(page = %source_path.display(), %error, "render failed");
                    }
                    let mut pages = self.pages.lock().unwrap();
                    if let Some(entry) = pages.get_mut(&source_path) {
                        entry.active_countdown = active_countdown;
                        // Keep the previous dependency set if extraction fails.
                        if let Ok(dependencies) = extract_dependencies(&source_path) {
                            entry.dependencies = dependencies;
                        }
                    }
                }
                TaskKind::Delete => {
                    let task = Task {
                        source_path: source_path.clone(),
                        kind: TaskKind::Delete,
                        is_open: false,
                        active_countdown: 0,
                    };
                    if let Err(error) = (callbacks.on_delete_needed)(&task) {
                        tracing::error!(page = %source_path.display(), %error, "delete failed");
                    }
                    self.pages.lock().unwrap().remove(&source_path);
                }
            }
            index += 1;
        }

        (callbacks.on_batch_done)();
        self.tasks.lock().unwrap().clear();
    }
}

fn dependencies_or_empty(path: &Path) -> Vec<PathBuf> {
    extract_dependencies(path).unwrap_or_else(|error| {
        tracing::warn!(page = %path.display(), %error, "dependency extraction failed");
        Vec::new()
    })
}

/// Dependency-aware page watcher.
///
/// Thread-safe; all methods take `&self`. Dropping the watcher (or calling
/// [`cleanup`](Self::cleanup)) stops the file-system watch.
pub struct Watcher {
    inner: Arc<Inner>,
    debounce: Duration,
    shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

impl Watcher {
    /// Create a watcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Pattern`] if an ignore pattern does not
    /// compile.
    pub fn new(config: WatchConfig) -> Result<Self, WatchError> {
        let ignore = config
            .ignore
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| WatchError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            inner: Arc::new(Inner {
                ignore,
                generated_files: config.generated_files,
                accepting: AtomicBool::new(true),
                pages: Mutex::new(HashMap::new()),
                tasks: Mutex::new(TaskQueue::default()),
                callbacks: Mutex::new(None),
            }),
            debounce: config.debounce,
            shutdown: Mutex::new(None),
        })
    }

    /// Install the batch callbacks. Replaces any previous set.
    pub fn set_callbacks(&self, callbacks: WatchCallbacks) {
        *self.inner.callbacks.lock().unwrap() = Some(callbacks);
    }

    /// Start tracking pages that already exist, without rendering them.
    ///
    /// Registered pages start dormant: no subscribers and a spent active
    /// countdown. Dependency extraction failures are logged and leave the
    /// page tracked with no dependencies.
    pub fn register_known_pages<I>(&self, pages: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut tracked = self.inner.pages.lock().unwrap();
        for page in pages {
            let dependencies = dependencies_or_empty(&page);
            tracked.insert(
                page,
                PageEntry {
                    dependencies,
                    active_countdown: 0,
                    subscribers: HashSet::new(),
                },
            );
        }
    }

    /// Attach the file-system watch and start the event pump.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Init`] if the watch cannot be attached.
    pub fn initialize(&self, root: &Path) -> Result<(), WatchError> {
        let debouncer = Arc::new(EventDebouncer::new(self.debounce));

        let inner = Arc::clone(&self.inner);
        let recorder = Arc::clone(&debouncer);
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let Ok(event) = res else { return };
                let kind = match event.kind {
                    notify::EventKind::Create(_) => FsEventKind::Created,
                    notify::EventKind::Modify(_) => FsEventKind::Modified,
                    notify::EventKind::Remove(_) => FsEventKind::Removed,
                    _ => return,
                };

                for path in event.paths {
                    if inner.is_ignored(&path) {
                        continue;
                    }
                    if inner.accepting.load(Ordering::SeqCst) {
                        recorder.record(path, kind);
                    } else {
                        inner.note_suppressed(&path);
                    }
                }
            })
            .map_err(|source| WatchError::Init {
                path: root.to_path_buf(),
                source,
            })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Init {
                path: root.to_path_buf(),
                source,
            })?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        *self.shutdown.lock().unwrap() = Some(shutdown_tx);

        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            // The notify watcher must stay alive for as long as we pump.
            let _watcher_guard = watcher;

            loop {
                match shutdown_rx.recv_timeout(PUMP_INTERVAL) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                let events = debouncer.drain_ready();
                if !events.is_empty() {
                    inner.process_events(&events);
                }
            }
        });

        Ok(())
    }

    /// Classify one debounced event group and drain the resulting batch
    /// synchronously.
    ///
    /// The event pump uses the same path internally; exposed for embedders
    /// that drive their own notification source.
    pub fn process_events(&self, events: &[FsEvent]) {
        self.inner.process_events(events);
    }

    /// Subscribe a live connection to a page.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::UnknownPage`] if the page is not tracked.
    pub fn add_subscriber(&self, page: &Path, id: SubscriberId) -> Result<(), WatchError> {
        let mut pages = self.inner.pages.lock().unwrap();
        let entry = pages
            .get_mut(page)
            .ok_or_else(|| WatchError::UnknownPage(page.to_path_buf()))?;
        entry.subscribers.insert(id);
        Ok(())
    }

    /// Drop a connection from every page it was subscribed to.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        let mut pages = self.inner.pages.lock().unwrap();
        for entry in pages.values_mut() {
            entry.subscribers.remove(&id);
        }
    }

    /// Pages that currently have at least one subscriber.
    #[must_use]
    pub fn open_pages(&self) -> Vec<PathBuf> {
        let pages = self.inner.pages.lock().unwrap();
        pages
            .iter()
            .filter(|(_, entry)| !entry.subscribers.is_empty())
            .map(|(page, _)| page.clone())
            .collect()
    }

    /// Whether the watcher tracks the given page.
    #[must_use]
    pub fn is_tracked(&self, page: &Path) -> bool {
        self.inner.pages.lock().unwrap().contains_key(page)
    }

    /// Stop watching and forget all tracked state, including the
    /// installed callbacks. Idempotent.
    pub fn cleanup(&self) {
        self.shutdown.lock().unwrap().take();
        self.inner.callbacks.lock().unwrap().take();
        self.inner.pages.lock().unwrap().clear();
        self.inner.tasks.lock().unwrap().clear();
        self.inner.accepting.store(true, Ordering::SeqCst);
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.cleanup();
    }
}
