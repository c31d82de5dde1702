//! Shared preamble synthesis and caching.

mod cache;
mod extract;

pub use cache::{PreambleCache, PreambleStatus};
pub use extract::{BASELINE_IMPORT, ExtractOptions, Scope, extract};
