//! Orbit site engine.
//!
//! Orchestrates the watcher ([`orbit_watch`]), the isolated render worker
//! ([`orbit_render`]) and the page tree ([`orbit_tree`]) into the two
//! entry points embedders use: [`Engine::build`] for one-shot site builds
//! and [`Engine::start`] for watch mode with a pluggable [`DevServer`].

mod cascade;
mod config;
mod engine;
mod error;
mod events;
mod gather;
mod server;

pub use cascade::dir_vars;
pub use config::{EngineConfig, TREE_DATA_FILE};
pub use engine::{Engine, EngineHandle};
pub use error::{EngineError, error_artifact};
pub use events::{EngineEvent, EngineEventReceiver};
pub use gather::gather_files;
pub use server::{ConnectionEvent, DevServer};
