// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - update: mirror the GitLab group into the local sqlite file
// - search: grep the mirrored files (refreshing first unless --cache is given)
//
// GitLab settings come from the environment (see config.rs), not from flags.
// =============================================================================

use std::path::PathBuf;

// Parser: derives parsing for the top-level struct
// Subcommand: derives parsing for an enum of subcommands
use clap::{Parser, Subcommand};

// The main CLI structure
// #[derive(Parser)] generates the parsing code from the attributes below
#[derive(Parser, Debug)]
#[command(
    name = "group-grep",
    version,
    about = "Mirror every repository of a GitLab group locally and grep across them",
    long_about = "group-grep downloads the files of every project in a GitLab group into a local \
                  sqlite file, then searches their contents with a regular expression. \
                  Configure it with GITLAB_ENDPOINT, GITLAB_GROUP and GITLAB_TOKEN."
)]
pub struct Cli {
    // Which subcommand the user picked (update or search)
    #[command(subcommand)]
    pub command: Commands,
}

// Each variant is one subcommand; its fields become that subcommand's flags
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refresh the local mirror from GitLab
    ///
    /// Example: group-grep update
    Update {
        /// Path to the sqlite mirror (default: GROUP_GREP_DB, then lite.db next to the binary)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Search mirrored files with a regular expression
    ///
    /// Example: group-grep search 'func \w+Handler' --cache -p api -p web -C 2
    Search {
        /// Regular expression matched against each line
        pattern: String,

        /// Only use what is already in the local mirror
        #[arg(short, long)]
        cache: bool,

        /// Restrict the search to these projects
        // Repeatable: -p api -p web collects into the Vec
        #[arg(short, long = "projects", value_name = "NAME")]
        projects: Vec<String>,

        /// Lines shown above and below each match (0 is treated as 1)
        #[arg(short = 'C', long, default_value_t = 1)]
        context: usize,

        /// Output matches as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Path to the sqlite mirror
        #[arg(long)]
        db: Option<PathBuf>,
    },
}
