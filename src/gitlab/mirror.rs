// src/gitlab/mirror.rs
// =============================================================================
// Walks a GitLab group top-down and builds the in-memory mirror.
//
// Stage A: group -> projects. Page 1 is fetched on the calling task (a failure
//          here ends the walk), the rest through the pagination pool.
// Stage B: one task per project in the "projects" pool. Each lists the
//          project's recursive tree the same way as stage A, then runs stage C,
//          then pushes the finished project onto the stage's fan-in.
// Stage C: one task per tree entry in the project's own "files" pool. Entries
//          the content filter rejects never reach the pool and keep empty
//          content.
//
// Every stage waits for its pool to join and its fan-in to finish before the
// parent goes on, so no stage ever sees half-built data from below.
//
// Failure handling per file:
//   non-2xx answer          -> entry kept, content "" (logged, not reported)
//   transport/decode error  -> entry dropped, error reported
//
// Cancellation: a project whose tree pages or file downloads were skipped by a
// cancelled pool is incomplete. It is left out of the outcome and reported as
// `Cancelled`, so nothing downstream mistakes it for the project's full tree.
// Projects that were never started are reported the same way.
//
// Pools are sized independently and nest, so the number of requests in
// flight is bounded by `Widths::max_in_flight`, not by one global cap.
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::collector::FanIn;
use super::error::FetchError;
use super::fetch::{fetch_page, Transport};
use super::filter::avoid_file;
use super::paginate::fetch_listing;
use super::pool::WorkerPool;
use super::types::{FileContent, FileRecord, ProjectRecord};

/// Fan-in capacity for finished projects.
const PROJECT_QUEUE: usize = 12;
/// Fan-in capacity for fetched files of one project.
const FILE_QUEUE: usize = 30;

/// Width of each kind of pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Widths {
    pub pages: usize,
    pub projects: usize,
    pub files: usize,
}

impl Default for Widths {
    fn default() -> Self {
        Self {
            pages: 3,
            projects: 3,
            files: 3,
        }
    }
}

impl Widths {
    /// Upper bound on concurrent requests during a walk.
    ///
    /// Each running project task either pages through its tree or downloads
    /// its files, never both at once; the group listing's own pages run
    /// before any project starts.
    pub fn max_in_flight(&self) -> usize {
        self.projects.max(1) * self.files.max(self.pages).max(1) + self.pages.max(1)
    }
}

/// URL builder for the three endpoints the walk uses.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
    group: String,
}

impl Endpoints {
    /// `base` is the API root, e.g. `https://gitlab.example.com/api/v4`.
    pub fn new(base: impl Into<String>, group: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
            group: group.into(),
        }
    }

    pub fn group_projects(&self) -> String {
        format!(
            "{}/groups/{}/projects?simple=true&per_page=100",
            self.base, self.group
        )
    }

    pub fn project_tree(&self, project_id: i64) -> String {
        format!(
            "{}/projects/{}/repository/tree?recursive=true&per_page=100",
            self.base, project_id
        )
    }

    pub fn file_content(&self, project_id: i64, path: &str, branch: &str) -> String {
        format!(
            "{}/projects/{}/repository/files/{}?ref={}",
            self.base,
            project_id,
            encode_path(path),
            branch
        )
    }
}

/// Encodes a repository path for the files endpoint: `/` then `.`.
pub fn encode_path(path: &str) -> String {
    path.replace('/', "%2F").replace('.', "%2E")
}

/// Result of a walk that got past the group listing.
#[derive(Debug, Default)]
pub struct MirrorOutcome {
    /// In arrival order.
    pub projects: Vec<ProjectRecord>,
    /// Every hard failure met along the way.
    pub error: Option<FetchError>,
}

impl MirrorOutcome {
    pub fn file_count(&self) -> usize {
        self.projects.iter().map(|p| p.files.len()).sum()
    }

    /// True when cancellation cut the walk short. `projects` then holds only
    /// the projects that were mirrored completely.
    pub fn was_cancelled(&self) -> bool {
        self.error.as_ref().map_or(false, FetchError::is_cancelled)
    }
}

#[derive(Clone)]
pub struct MirrorWalker {
    transport: Arc<dyn Transport>,
    endpoints: Arc<Endpoints>,
    widths: Widths,
    cancel: CancellationToken,
}

impl MirrorWalker {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        widths: Widths,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            endpoints: Arc::new(endpoints),
            widths,
            cancel,
        }
    }

    /// Mirrors the whole group.
    ///
    /// Fails only when the first page of the group listing cannot be fetched
    /// or decoded. Anything else is reported through `MirrorOutcome::error`
    /// next to the projects that did come back.
    pub async fn walk(&self) -> Result<MirrorOutcome, FetchError> {
        tracing::info!(
            max_in_flight = self.widths.max_in_flight(),
            "getting group projects from gitlab"
        );

        let url = self.endpoints.group_projects();
        let listing =
            fetch_listing::<ProjectRecord>(Arc::clone(&self.transport), &url, self.widths.pages, &self.cancel)
                .await?;

        let mut errors: Vec<FetchError> = listing.error.into_iter().collect();
        let projects = unique_by_key(listing.items, |p| p.id);
        tracing::info!(projects = projects.len(), "listed group projects");

        let fan_in = FanIn::new(PROJECT_QUEUE);
        let mut pool = WorkerPool::new("projects", self.widths.projects, self.cancel.clone());

        for project in projects {
            let walker = self.clone();
            let tx = fan_in.sender();
            pool.submit(async move {
                tx.send(walker.mirror_project(project).await).await;
            });
        }

        let skipped = pool.join().await;
        if skipped > 0 {
            errors.push(FetchError::cancelled("pool=projects", skipped));
        }

        let mut mirrored = Vec::new();
        for result in fan_in.finish().await {
            match result {
                Ok((project, error)) => {
                    errors.extend(error);
                    mirrored.push(project);
                }
                Err(error) => errors.push(error),
            }
        }

        let outcome = MirrorOutcome {
            projects: mirrored,
            error: FetchError::aggregate(errors),
        };

        tracing::info!(
            projects = outcome.projects.len(),
            files = outcome.file_count(),
            failures = outcome.error.as_ref().map_or(0, FetchError::count),
            cancelled = outcome.was_cancelled(),
            "finished mirroring group"
        );

        Ok(outcome)
    }

    /// Stage B for one project: tree listing, then contents.
    ///
    /// A project whose first tree page fails, or whose tree or contents were
    /// cut short by cancellation, is dropped.
    async fn mirror_project(
        &self,
        mut project: ProjectRecord,
    ) -> Result<(ProjectRecord, Option<FetchError>), FetchError> {
        let label = format!("project={}", project.name);
        tracing::debug!(project = %project.name, "listing files");

        let url = self.endpoints.project_tree(project.id);
        let listing =
            fetch_listing::<FileRecord>(Arc::clone(&self.transport), &url, self.widths.pages, &self.cancel)
                .await
                .map_err(|e| {
                    tracing::warn!(project = %project.name, error = %e, "failed to list files");
                    e.within(&label)
                })?;

        let mut errors: Vec<FetchError> = listing.error.into_iter().collect();
        let entries = unique_by_key(listing.items, |f| f.id.clone());

        if !errors.iter().any(FetchError::is_cancelled) {
            let (files, file_errors) = self
                .fetch_contents(project.id, project.branch(), entries)
                .await;
            errors.extend(file_errors);
            project.files = files;
        }

        if errors.iter().any(FetchError::is_cancelled) {
            tracing::warn!(project = %project.name, "cancelled before finishing, leaving it out");
            let error = FetchError::aggregate(errors)
                .unwrap_or_else(|| FetchError::cancelled("", 0))
                .within(&label);
            return Err(error);
        }

        tracing::info!(project = %project.name, files = project.files.len(), "mirrored project");

        let error = FetchError::aggregate(errors).map(|e| e.within(&label));
        Ok((project, error))
    }

    /// Stage C for one project.
    async fn fetch_contents(
        &self,
        project_id: i64,
        branch: &str,
        entries: Vec<FileRecord>,
    ) -> (Vec<FileRecord>, Vec<FetchError>) {
        let mut files = Vec::with_capacity(entries.len());
        let fan_in = FanIn::new(FILE_QUEUE);
        let mut pool = WorkerPool::new("files", self.widths.files, self.cancel.clone());

        for mut entry in entries {
            entry.project_id = project_id;

            if avoid_file(&entry.path) {
                files.push(entry);
                continue;
            }

            let transport = Arc::clone(&self.transport);
            let url = self.endpoints.file_content(project_id, &entry.path, branch);
            let tx = fan_in.sender();
            pool.submit(async move {
                tx.send(fetch_content(transport.as_ref(), &url, entry).await).await;
            });
        }

        let skipped = pool.join().await;

        let mut errors = Vec::new();
        if skipped > 0 {
            errors.push(FetchError::cancelled("pool=files", skipped));
        }
        for result in fan_in.finish().await {
            match result {
                Ok(file) => files.push(file),
                Err(error) => errors.push(error),
            }
        }

        (files, errors)
    }
}

/// Downloads one file's content into its tree entry.
async fn fetch_content(
    transport: &dyn Transport,
    url: &str,
    entry: FileRecord,
) -> Result<FileRecord, FetchError> {
    let label = format!("path={}", entry.path);
    tracing::debug!(path = %entry.path, "getting content");

    let page = fetch_page(transport, url).await.map_err(|e| {
        tracing::warn!(path = %entry.path, error = %e, "failed to get content");
        e.within(&label)
    })?;

    if !page.is_success() {
        // Soft failure: logged, never aggregated.
        let error = FetchError::status(label.as_str(), page.status);
        tracing::warn!(error = %error, "keeping file without content");
        return Ok(entry);
    }

    let content: FileContent = serde_json::from_slice(&page.body).map_err(|e| {
        let error = FetchError::decode(label.as_str(), e, &page.body);
        tracing::warn!(path = %entry.path, error = %error, "failed to decode content");
        error
    })?;

    Ok(FileRecord {
        content: content.content,
        ..entry
    })
}

/// Keeps the first item for every key.
fn unique_by_key<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let before = items.len();
    let unique: Vec<T> = items.into_iter().filter(|item| seen.insert(key(item))).collect();

    if unique.len() < before {
        tracing::debug!(duplicates = before - unique.len(), "dropped duplicate records");
    }

    unique
}
