//! Per-path event coalescing with a quiet period.
//!
//! Editors produce bursts of raw notifications for a single save. Each
//! recorded event opens (or extends) a quiet window for its path; once the
//! window closes without further activity the path is released with one
//! merged event kind. Opposite events inside one window can cancel each
//! other entirely.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::event::{FsEvent, FsEventKind};

struct Slot {
    kind: FsEventKind,
    due: Instant,
}

/// Collects raw notifications and releases one merged event per path once
/// that path has been quiet long enough. Recorded from the notify callback,
/// drained from the pump thread.
pub(crate) struct EventDebouncer {
    quiet: Duration,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl EventDebouncer {
    pub(crate) fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Note a raw event, merging it into whatever is already pending for
    /// the path and restarting the path's quiet window.
    pub(crate) fn record(&self, path: PathBuf, kind: FsEventKind) {
        let due = Instant::now() + self.quiet;
        let mut slots = self.slots.lock().unwrap();
        match slots.entry(path) {
            Entry::Vacant(vacant) => {
                vacant.insert(Slot { kind, due });
            }
            Entry::Occupied(mut occupied) => match merge(occupied.get().kind, kind) {
                Some(kind) => *occupied.get_mut() = Slot { kind, due },
                None => {
                    occupied.remove();
                }
            },
        }
    }

    /// Release every path whose quiet window has closed.
    pub(crate) fn drain_ready(&self) -> Vec<FsEvent> {
        let now = Instant::now();
        self.slots
            .lock()
            .unwrap()
            .extract_if(|_, slot| slot.due <= now)
            .map(|(path, slot)| FsEvent {
                path,
                kind: slot.kind,
            })
            .collect()
    }
}

/// Merge a later raw event into the pending one for the same path.
///
/// `None` means the pair cancels: a file created and removed within one
/// quiet window was never observable.
fn merge(pending: FsEventKind, later: FsEventKind) -> Option<FsEventKind> {
    use FsEventKind::{Created, Modified, Removed};

    match (pending, later) {
        (Created, Removed) => None,
        // Edits to a file we have not announced yet fold into its creation.
        (Created, _) | (Modified, Created) => Some(Created),
        // Removed then recreated reads as a change of the surviving file.
        (Removed, Created) => Some(Modified),
        (Modified, Modified) => Some(Modified),
        (Modified, Removed) | (Removed, _) => Some(Removed),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;

    const QUIET: Duration = Duration::from_millis(10);

    fn wait_out_quiet_window() {
        thread::sleep(QUIET + Duration::from_millis(10));
    }

    #[test]
    fn test_path_released_only_after_quiet_window() {
        let debouncer = EventDebouncer::new(QUIET);
        debouncer.record(PathBuf::from("/docs/a.page.md"), FsEventKind::Modified);

        assert!(debouncer.drain_ready().is_empty());

        wait_out_quiet_window();
        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, Path::new("/docs/a.page.md"));
        assert_eq!(events[0].kind, FsEventKind::Modified);

        // Drained once, gone.
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_burst_collapses_to_one_event_per_path() {
        let debouncer = EventDebouncer::new(QUIET);
        for _ in 0..4 {
            debouncer.record(PathBuf::from("/docs/a.page.md"), FsEventKind::Modified);
        }
        debouncer.record(PathBuf::from("/docs/b.page.md"), FsEventKind::Created);

        wait_out_quiet_window();
        let mut events = debouncer.drain_ready();
        events.sort_by(|x, y| x.path.cmp(&y.path));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, FsEventKind::Modified);
        assert_eq!(events[1].kind, FsEventKind::Created);
    }

    #[test]
    fn test_created_then_removed_cancels_out() {
        let debouncer = EventDebouncer::new(QUIET);
        let path = PathBuf::from("/docs/fleeting.page.md");
        debouncer.record(path.clone(), FsEventKind::Created);
        debouncer.record(path, FsEventKind::Removed);

        wait_out_quiet_window();
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_merge_matrix() {
        use FsEventKind::{Created, Modified, Removed};

        let cases = [
            (Created, Created, Some(Created)),
            (Created, Modified, Some(Created)),
            (Created, Removed, None),
            (Modified, Created, Some(Created)),
            (Modified, Modified, Some(Modified)),
            (Modified, Removed, Some(Removed)),
            (Removed, Created, Some(Modified)),
            (Removed, Modified, Some(Removed)),
            (Removed, Removed, Some(Removed)),
        ];
        for (pending, later, want) in cases {
            assert_eq!(merge(pending, later), want, "{pending:?} then {later:?}");
        }
    }
}
