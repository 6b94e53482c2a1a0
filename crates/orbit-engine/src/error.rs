//! Engine error type and the render-failure artifact.

use std::io;
use std::path::PathBuf;

use orbit_render::RenderError;
use orbit_tree::TreeError;
use orbit_watch::WatchError;

/// Engine orchestration error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A file-system operation failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The watcher failed.
    #[error(transparent)]
    Watch(#[from] WatchError),
    /// The page tree failed.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// The render worker failed in a way the engine cannot absorb.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The dev server failed to start.
    #[error("dev server failed: {0}")]
    Server(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Diagnostic HTML written in place of a page whose render failed.
///
/// Carries the full error chain so the browser shows what went wrong
/// instead of a stale or missing page.
#[must_use]
pub fn error_artifact(error: &dyn std::error::Error) -> String {
    let mut chain = escape(&error.to_string());
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str("\ncaused by: ");
        chain.push_str(&escape(&cause.to_string()));
        source = cause.source();
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Render error</title></head>\n<body>\n<h1>Render error</h1>\n<pre>{chain}</pre>\n</body>\n</html>\n"
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
