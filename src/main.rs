// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Load .env, set up logging, parse command-line arguments
// 2. Install the Ctrl+C handler that cancels the mirror walk
// 3. Dispatch to the update or search handler
// 4. Exit with proper code (0 = success, 1 = some fetches failed or the walk
//    was cancelled, 2 = error)
//
// Rust concepts used:
// - async/await: the mirror walk makes many GitLab requests concurrently
// - Arc<dyn Trait>: the walker shares one HTTP transport between tasks
// - Result<T, E> with `?`: errors bubble up to main and become exit code 2
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;       // src/cli.rs - command-line parsing
mod config;    // src/config.rs - environment settings
mod gitlab;    // src/gitlab/ - the concurrent mirror walk
mod search;    // src/search/ - regex search over mirrored files
mod shutdown;  // src/shutdown.rs - Ctrl+C handling
mod store;     // src/store/ - sqlite persistence

use std::path::PathBuf;
use std::sync::Arc;

// anyhow::Result lets every handler return any error type with `?`
use anyhow::{Context, Result};
use clap::Parser;  // Parser trait enables the parse() method
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use config::GitLabConfig;
use gitlab::{Endpoints, HttpTransport, MirrorWalker, ProjectRecord};
use store::Store;

// The #[tokio::main] attribute creates a tokio runtime and runs our async
// main inside it
#[tokio::main]
async fn main() {
    // A missing .env is fine; the variables may come from the environment.
    dotenvy::dotenv().ok();
    init_tracing();

    // Run the application logic and turn the result into an exit code
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // `{:#}` prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Logs go to stderr so `search --json` output stays parseable.
fn init_tracing() {
    // RUST_LOG wins when set, e.g. RUST_LOG=group_grep=debug
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("group_grep=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// Returns:
//   Ok(0) = everything mirrored / searched
//   Ok(1) = the walk finished but some fetches failed, or it was cancelled
//   Err   = fatal error (exit code 2)
async fn run() -> Result<i32> {
    // Parse command-line arguments; clap handles --help and --version
    let cli = Cli::parse();

    // One token for the whole walk; the first Ctrl+C cancels it
    let cancel = CancellationToken::new();
    shutdown::install(cancel.clone());

    match cli.command {
        Commands::Update { db } => handle_update(db, cancel).await,
        Commands::Search {
            pattern,
            cache,
            projects,
            context,
            json,
            db,
        } => handle_search(&pattern, cache, &projects, context, json, db, cancel).await,
    }
}

// Handles the 'update' subcommand: mirror the group, cache it, print a summary
async fn handle_update(db: Option<PathBuf>, cancel: CancellationToken) -> Result<i32> {
    let mut store = Store::open(config::database_path(db)?)?;
    let (projects, code) = refresh(&mut store, cancel).await?;

    let files: usize = projects.iter().map(|p| p.files.len()).sum();
    println!("✅ Mirrored {} project(s), {} file(s)", projects.len(), files);

    Ok(code)
}

// Handles the 'search' subcommand
// Parameters:
//   pattern: regular expression matched against every line
//   from_cache: search the sqlite mirror without refreshing it first
//   names: only search these projects (empty = all)
//   context: lines shown around each match
//   json: print hits as JSON instead of text
async fn handle_search(
    pattern: &str,
    from_cache: bool,
    names: &[String],
    context: usize,
    json: bool,
    db: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<i32> {
    let mut store = Store::open(config::database_path(db)?)?;

    // Either read what is already mirrored, or refresh and use the fresh copy
    let (projects, code) = if from_cache {
        let projects = if names.is_empty() {
            store.select_all_projects()?
        } else {
            store.select_projects(names)?
        };
        (projects, 0)
    } else {
        let (mut projects, code) = refresh(&mut store, cancel).await?;
        if !names.is_empty() {
            projects.retain(|p| names.contains(&p.name));
        }
        (projects, code)
    };

    if projects.is_empty() {
        println!("⚠️  No projects to search");
        return Ok(code);
    }

    tracing::info!(pattern, projects = projects.len(), "searching");
    let hits = search::search_projects(&projects, pattern, context)?;

    if json {
        // Pretty JSON so the output can be piped straight into jq
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        for hit in &hits {
            println!(
                "Found in [project={}] [file={}] [line={}]\n{}",
                hit.project,
                hit.path,
                hit.found.line_number,
                hit.found.render()
            );
        }
        println!("📊 {} match(es) in {} project(s)", hits.len(), projects.len());
    }

    Ok(code)
}

/// Walks the group, caches what came back, and returns it.
///
/// The exit code is 1 when the walk reported failures or was cancelled.
/// Projects the walk did not finish are never cached, so a cancelled
/// update leaves their previous copy in the store untouched.
async fn refresh(store: &mut Store, cancel: CancellationToken) -> Result<(Vec<ProjectRecord>, i32)> {
    // GitLab settings are only needed here, so `search --cache` works without them
    let config = GitLabConfig::from_env()?;
    let transport = HttpTransport::new(&config.token, config.timeout)?;

    let walker = MirrorWalker::new(
        Arc::new(transport),
        Endpoints::new(config.endpoint, config.group),
        config.widths,
        cancel,
    );

    // Only a failed first page of the group listing is fatal
    let outcome = walker
        .walk()
        .await
        .context("failed to get group projects")?;

    store.cache_projects(&outcome.projects);

    if outcome.was_cancelled() {
        eprintln!("⚠️  Cancelled: unfinished projects were not cached");
    }

    let code = match &outcome.error {
        Some(error) => {
            eprintln!("⚠️  {} fetch(es) failed:\n{}", error.count(), error);
            1
        }
        None => 0,
    };

    Ok((outcome.projects, code))
}
