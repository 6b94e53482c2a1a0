//! Dev server contract.
//!
//! The engine does not speak HTTP or any live-reload transport itself; a
//! [`DevServer`] implementation brings its own. The engine hands it an
//! [`EngineHandle`](crate::EngineHandle) at start and notifies it after
//! every processed batch.

use std::path::PathBuf;

use orbit_watch::SubscriberId;

use crate::engine::EngineHandle;

/// A live connection opening on or leaving a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection subscribed to a page.
    Opened {
        /// Connection identifier, assigned by the dev server.
        id: SubscriberId,
        /// Absolute path of the page's source file.
        source_path: PathBuf,
    },
    /// A connection went away.
    Closed {
        /// Connection identifier.
        id: SubscriberId,
    },
}

/// The serving side of watch mode.
pub trait DevServer: Send {
    /// Start serving. The handle is the server's door into the engine:
    /// lazy renders for requests, subscriber registration for
    /// connections.
    ///
    /// # Errors
    ///
    /// A startup failure aborts [`Engine::start`](crate::Engine::start).
    fn start(
        &mut self,
        handle: EngineHandle,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// A batch finished; connected clients should reload.
    fn notify_updated(&mut self);

    /// Stop serving. Called from engine cleanup.
    fn stop(&mut self);
}
