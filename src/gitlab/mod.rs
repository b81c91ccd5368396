// src/gitlab/mod.rs
// =============================================================================
// This module mirrors a GitLab group into memory.
//
// Submodules, leaf first:
// - fetch: one authenticated GET, plus the x-total-pages header
// - pool: fixed-width worker pool with cooperative cancellation
// - collector: fan-in of many producers into one Vec
// - paginate: first page, then the remaining pages through a pool
// - filter: which paths are not worth downloading
// - mirror: group -> projects -> tree -> file contents
//
// The rest of the application only needs `MirrorWalker` and the records it
// returns.
// =============================================================================

mod collector;
mod error;
mod fetch;
mod filter;
mod mirror;
mod paginate;
mod pool;
mod types;

#[cfg(test)]
mod testing;

pub use fetch::HttpTransport;
pub use mirror::{Endpoints, MirrorWalker, Widths};
pub use types::{FileRecord, ProjectRecord};
