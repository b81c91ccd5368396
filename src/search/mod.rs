// src/search/mod.rs
// =============================================================================
// Regex search over mirrored projects.
// =============================================================================

mod matcher;

pub use matcher::search_projects;
