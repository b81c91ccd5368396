// src/config.rs
// =============================================================================
// Settings, read from the environment.
//
// A `.env` file in the working directory is loaded first (main does that with
// dotenvy), so either works:
//
//   GITLAB_ENDPOINT=https://gitlab.example.com/api/v4
//   GITLAB_GROUP=platform
//   GITLAB_TOKEN=glpat-...
//
// Optional:
//   GROUP_GREP_DB                sqlite file (default: lite.db next to the binary)
//   GROUP_GREP_PAGE_WORKERS      pagination pool width   (default 3)
//   GROUP_GREP_PROJECT_WORKERS   per-project pool width  (default 3)
//   GROUP_GREP_FILE_WORKERS      per-file pool width     (default 3)
//   GROUP_GREP_TIMEOUT_SECS      per-request timeout     (default 30)
//
// The GitLab settings are only read when a command actually talks to GitLab,
// so `search --cache` works without them.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use url::Url;

use crate::gitlab::Widths;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_FILE: &str = "lite.db";

/// Everything needed to walk a GitLab group.
#[derive(Debug, Clone)]
pub struct GitLabConfig {
    /// API root without a trailing slash.
    pub endpoint: String,
    pub group: String,
    pub token: String,
    pub widths: Widths,
    pub timeout: Duration,
}

impl GitLabConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("{} is not set (environment or .env)", key))
        };

        let endpoint = required("GITLAB_ENDPOINT")?;
        let parsed = Url::parse(&endpoint)
            .with_context(|| format!("GITLAB_ENDPOINT is not a valid URL: {}", endpoint))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            bail!("GITLAB_ENDPOINT must be http or https: {}", endpoint);
        }

        let defaults = Widths::default();
        let widths = Widths {
            pages: worker_count(&lookup, "GROUP_GREP_PAGE_WORKERS", defaults.pages)?,
            projects: worker_count(&lookup, "GROUP_GREP_PROJECT_WORKERS", defaults.projects)?,
            files: worker_count(&lookup, "GROUP_GREP_FILE_WORKERS", defaults.files)?,
        };

        let timeout = match lookup("GROUP_GREP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("GROUP_GREP_TIMEOUT_SECS is not a number: {}", raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            group: required("GITLAB_GROUP")?,
            token: required("GITLAB_TOKEN")?,
            widths,
            timeout: Duration::from_secs(timeout),
        })
    }
}

fn worker_count(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> Result<usize> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().parse::<usize>() {
        Ok(0) => bail!("{} must be at least 1", key),
        Ok(n) => Ok(n),
        Err(e) => Err(anyhow!("{} is not a number: {} ({})", key, raw, e)),
    }
}

/// Where the sqlite mirror lives: `--db`, then GROUP_GREP_DB, then
/// `lite.db` next to the executable.
pub fn database_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }

    if let Some(path) = std::env::var_os("GROUP_GREP_DB").filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let exe = std::env::current_exe().context("failed to locate the executable")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow!("executable has no parent directory: {}", exe.display()))?;
    Ok(dir.join(DEFAULT_DB_FILE))
}
