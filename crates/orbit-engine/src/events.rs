//! Engine event notification.

use std::sync::mpsc;

/// An event emitted by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// A watch batch finished; rendered output and the page tree are
    /// consistent again.
    Updated,
}

/// Receiver for engine events.
///
/// Wraps a [`std::sync::mpsc::Receiver`] for synchronous delivery.
pub struct EngineEventReceiver {
    rx: mpsc::Receiver<EngineEvent>,
}

impl EngineEventReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<EngineEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event (blocking).
    ///
    /// Returns `None` when the engine is gone.
    #[must_use]
    pub fn recv(&self) -> Option<EngineEvent> {
        self.rx.recv().ok()
    }

    /// Try to receive an event without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }

    /// Iterator over events; blocks until one is available, stops when
    /// the engine is gone.
    pub fn iter(&self) -> impl Iterator<Item = EngineEvent> + '_ {
        self.rx.iter()
    }
}
