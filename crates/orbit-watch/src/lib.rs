//! File watching for the Orbit engine.
//!
//! Watches a docs directory, debounces raw file-system events into groups,
//! and classifies each group into an
//! ordered batch of per-page tasks: creates for new page files, updates
//! fanned out across every page that depends on the changed file, deletes
//! for removed pages. Batches drain atomically; events caused by the
//! batch's own writes are suppressed.
//!
//! The [`Watcher`] owns no rendering logic. It reports work through
//! [`WatchCallbacks`] and leaves the consequences to the engine.

mod debounce;
mod event;
mod watcher;

pub use event::{FsEvent, FsEventKind};
pub use watcher::{
    CallbackError, INITIAL_ACTIVE_COUNTDOWN, SubscriberId, Task, TaskKind, WatchCallbacks,
    WatchConfig, WatchError, Watcher,
};
