//! File-system event types consumed by the watcher.

use std::path::PathBuf;

/// Kind of file-system change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsEventKind {
    /// File was created.
    Created,
    /// File was modified.
    Modified,
    /// File was removed.
    Removed,
}

/// A file-system change event, after debouncing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEvent {
    /// Absolute path to the changed file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FsEventKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_variants() {
        assert_ne!(FsEventKind::Created, FsEventKind::Modified);
        assert_ne!(FsEventKind::Modified, FsEventKind::Removed);
        assert_ne!(FsEventKind::Created, FsEventKind::Removed);
    }

    #[test]
    fn test_event_construction() {
        let event = FsEvent {
            path: PathBuf::from("/docs/guide.page.md"),
            kind: FsEventKind::Modified,
        };
        assert_eq!(event.path, PathBuf::from("/docs/guide.page.md"));
        assert_eq!(event.kind, FsEventKind::Modified);
    }
}
