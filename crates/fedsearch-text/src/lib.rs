//! fedsearch-text
//!
//! Tantivy-backed persistence for the mediator: the resource directory and
//! the result cache / corpus. See `examples/` for CLI-like usage during
//! development.

pub mod cache;
pub mod directory;
pub mod tantivy_utils;

pub use cache::{cache_key, normalize_query, ResultCache};
pub use directory::ResourceDirectory;
