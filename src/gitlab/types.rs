// src/gitlab/types.rs
// =============================================================================
// The records the mirror walk produces.
//
// A ProjectRecord is decoded from one page of the group-projects listing and
// later receives its FileRecords. A FileRecord is decoded from one page of the
// recursive tree listing with empty content, then filled in by the content
// fetch (or left empty when the file was filtered or the fetch soft-failed).
//
// Both are plain serde structs: the same shape is decoded from GitLab JSON,
// written to sqlite by the store, and printed with --json.
// =============================================================================

use serde::{Deserialize, Serialize};

/// A project in the mirrored group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Remote-assigned, unique, never changes.
    pub id: i64,
    pub name: String,
    /// GitLab sends `null` for projects without a description.
    #[serde(default)]
    pub description: Option<String>,
    /// `null` for empty repositories.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Filled in by the file stage; never part of the listing payload.
    #[serde(skip_deserializing)]
    pub files: Vec<FileRecord>,
}

impl ProjectRecord {
    /// The ref used for content lookups.
    ///
    /// GitLab resolves `HEAD` to the default branch, so projects that report
    /// no default branch still get a usable ref.
    pub fn branch(&self) -> &str {
        self.default_branch.as_deref().unwrap_or("HEAD")
    }
}

/// One entry of a project's repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Blob id; stable across refreshes while the file is unchanged.
    pub id: String,
    pub name: String,
    /// Repository-relative path.
    pub path: String,
    /// Base64 exactly as GitLab returned it, or "" when not downloaded.
    #[serde(default)]
    pub content: String,
    /// Owning project's id; set by the pipeline, never by the listing.
    #[serde(default)]
    pub project_id: i64,
}

impl FileRecord {
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Body of `GET /projects/:id/repository/files/:path?ref=...`.
///
/// Only the content is kept; every other field stays with the tree entry.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileContent {
    #[serde(default)]
    pub content: String,
}
