// src/store/mod.rs
// =============================================================================
// Local persistence for mirrored projects (sqlite via rusqlite).
//
// The store sits downstream of the fetch pipeline: main hands it the records a
// walk produced, and `search --cache` reads them back.
// =============================================================================

mod sqlite;

pub use sqlite::Store;
