// src/store/sqlite.rs
// =============================================================================
// The local mirror: one sqlite file with two tables.
//
//   projects(id, name, description, default_branch)
//   files(project_id, id, name, path, content)  -- keyed by (project_id, id)
//
// Writes are keyed by the remote ids, so running a refresh twice leaves the
// same rows behind. A project's files are replaced as a whole on every write;
// files that disappeared upstream disappear here too.
//
// The handle is created by whoever needs it and passed down. Nothing in the
// fetch pipeline knows it exists.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection};

use crate::gitlab::{FileRecord, ProjectRecord};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER NOT NULL PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        default_branch TEXT
    );

    CREATE TABLE IF NOT EXISTS files (
        project_id INTEGER NOT NULL REFERENCES projects(id),
        id TEXT NOT NULL,
        name TEXT NOT NULL,
        path TEXT NOT NULL,
        content TEXT,
        PRIMARY KEY (project_id, id)
    );

    CREATE INDEX IF NOT EXISTS idx_projects_name ON projects(name);
";

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database [path={}]", path.display()))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to create sqlite tables")?;
        Ok(Self { conn })
    }

    /// Writes one project and replaces its files, in a single transaction.
    ///
    /// A file that cannot be written is logged and skipped.
    pub fn upsert_project(&mut self, project: &ProjectRecord) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO projects (id, name, description, default_branch)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                default_branch = excluded.default_branch",
            params![
                project.id,
                &project.name,
                &project.description,
                &project.default_branch
            ],
        )
        .with_context(|| format!("failed to write project [name={}]", project.name))?;

        tx.execute("DELETE FROM files WHERE project_id = ?1", params![project.id])?;

        {
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO files (project_id, id, name, path, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for file in &project.files {
                if let Err(e) = insert.execute(params![
                    project.id,
                    &file.id,
                    &file.name,
                    &file.path,
                    &file.content
                ]) {
                    tracing::warn!(path = %file.path, error = %e, "failed to write file");
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Writes every project; returns how many were saved.
    pub fn cache_projects(&mut self, projects: &[ProjectRecord]) -> usize {
        tracing::info!(projects = projects.len(), "caching projects");

        let mut saved = 0;
        for project in projects {
            match self.upsert_project(project) {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::warn!(project = %project.name, error = %e, "failed to cache project")
                }
            }
        }

        tracing::info!(saved, "finished caching projects");
        saved
    }

    /// Projects whose name is one of `names`, with their files.
    pub fn select_projects(&self, names: &[String]) -> Result<Vec<ProjectRecord>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "SELECT id, name, description, default_branch FROM projects WHERE name IN ({}) ORDER BY name",
            placeholders
        );
        self.load_projects(&sql, params_from_iter(names.iter()))
    }

    pub fn select_all_projects(&self) -> Result<Vec<ProjectRecord>> {
        self.load_projects(
            "SELECT id, name, description, default_branch FROM projects ORDER BY name",
            params![],
        )
    }

    pub fn select_files(&self, project_id: i64) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, path, content, project_id FROM files WHERE project_id = ?1 ORDER BY path",
        )?;

        let files = stmt
            .query_map(params![project_id], |row| {
                Ok(FileRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    path: row.get(2)?,
                    content: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    project_id: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(files)
    }

    fn load_projects<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<ProjectRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut projects = stmt
            .query_map(params, |row| {
                Ok(ProjectRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    default_branch: row.get(3)?,
                    files: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read projects")?;

        for project in &mut projects {
            match self.select_files(project.id) {
                Ok(files) => project.files = files,
                Err(e) => {
                    tracing::warn!(project = %project.name, error = %e, "failed to read files")
                }
            }
        }

        Ok(projects)
    }
}
