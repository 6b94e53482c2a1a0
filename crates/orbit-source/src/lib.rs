//! Page-file conventions for the Orbit engine.
//!
//! This crate defines what a *page file* is and everything that can be known
//! about one without rendering it:
//!
//! - [`is_page_file`] and the recognized [`PAGE_ENDINGS`]
//! - front matter parsing into [`PageData`] and include-directive scanning
//!   ([`PageFile`])
//! - the URL naming convention ([`to_url`], [`to_output_relative`]) with
//!   numeric order-prefix cleaning (`10--guide` becomes `guide`)
//! - one-level static dependency extraction ([`extract_dependencies`])
//!
//! Everything here is pure and stateless; the watcher, render worker and
//! engine all consume these functions as services.

mod extract;
mod page;
mod paths;

pub use extract::{DIR_DATA_FILE, ExtractError, extract_dependencies};
pub use page::{PageData, PageError, PageFile, expand_includes, include_targets};
pub use paths::{
    PAGE_ENDINGS, clean_order, is_page_file, normalize, strip_page_ending, to_output_relative,
    to_url, url_level,
};
