//! Rendering for the Orbit engine.
//!
//! A single [`RenderWorker`] thread turns page sources into HTML:
//! load through the [`ModuleHost`] (front matter, include expansion,
//! per-generation caching), markdown conversion with generated heading
//! ids, layout placeholder substitution, then the [`Transform`] chain.
//! Repeat renders of the same page recycle the host so file edits are
//! always observed.

mod error;
mod host;
mod layout;
mod markdown;
mod transform;
mod worker;

pub use error::{RenderError, TransformError};
pub use host::{LoadedModule, ModuleHost};
pub use layout::apply_layout;
pub use markdown::markdown_to_html;
pub use transform::{AssetUrlRewriter, RenderContext, Transform};
pub use worker::{RenderRequest, RenderResult, RenderWorker, TransformFactory};
