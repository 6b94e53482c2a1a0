//! Render error type.

use std::io;
use std::path::PathBuf;

/// Error type transforms may return.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

/// Error from the render worker or its pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A render call is already outstanding.
    #[error("render already in flight for {}", in_flight.display())]
    Concurrent {
        /// Page currently being rendered.
        in_flight: PathBuf,
    },
    /// The worker replied for a different page than was requested.
    #[error("worker replied for {}, expected {}", got.display(), expected.display())]
    PathMismatch {
        /// Page the reply was expected for.
        expected: PathBuf,
        /// Page the reply actually names.
        got: PathBuf,
    },
    /// A source, include or layout file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A source, include or layout file could not be parsed.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: orbit_source::PageError,
    },
    /// Include directives form a cycle.
    #[error("include cycle through {}", path.display())]
    IncludeCycle {
        /// Path that was loaded twice in one chain.
        path: PathBuf,
    },
    /// A transform failed.
    #[error("transform {name:?} failed: {source}")]
    Transform {
        /// Name of the failing transform.
        name: String,
        /// Underlying transform error.
        #[source]
        source: TransformError,
    },
    /// The rendered output could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Output path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The worker thread is gone and could not be restarted.
    #[error("render worker is unavailable")]
    WorkerUnavailable,
}
