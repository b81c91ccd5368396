// src/gitlab/error.rs
// =============================================================================
// Errors raised while walking the GitLab group.
//
// Every variant carries a `context` string naming the unit of work that failed
// (a page URL and number, or a file path) so that an aggregated report can be
// read without any other state.
//
//   Transport  - connection refused, timeout, body read failure
//   Decode     - malformed JSON or a non-numeric x-total-pages header
//   HttpStatus - a non-2xx answer to a content lookup (soft failure)
//   Cancelled  - work a pool never started because the walk was cancelled
//   Aggregate  - sibling failures collected by one stage
// =============================================================================

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Underlying cause of a transport failure (a `reqwest::Error` in production).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Longest payload excerpt kept in a decode error.
const SNIPPET_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure [{context}] [error={source}]")]
    Transport {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("decode failure [{context}] [error={message}] [data={snippet}]")]
    Decode {
        context: String,
        message: String,
        snippet: String,
    },

    #[error("unexpected status [{context}] [status_code={status}]")]
    HttpStatus { context: String, status: u16 },

    #[error("cancelled before finishing [{context}] [skipped={skipped}]")]
    Cancelled { context: String, skipped: usize },

    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<FetchError>),
}

impl FetchError {
    pub fn transport(context: impl Into<String>, error: impl Into<BoxError>) -> Self {
        Self::Transport {
            context: context.into(),
            source: error.into(),
        }
    }

    /// Decode failure with an excerpt of the payload that could not be read.
    pub fn decode(context: impl Into<String>, error: impl fmt::Display, payload: &[u8]) -> Self {
        Self::Decode {
            context: context.into(),
            message: error.to_string(),
            snippet: snippet(payload),
        }
    }

    pub fn status(context: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            context: context.into(),
            status,
        }
    }

    /// `skipped` units of work were dropped by a cancelled pool.
    pub fn cancelled(context: impl Into<String>, skipped: usize) -> Self {
        Self::Cancelled {
            context: context.into(),
            skipped,
        }
    }

    /// Prefixes the context with the unit of work it belongs to, e.g. the
    /// project or file path a page request was made for.
    pub fn within(self, outer: impl fmt::Display) -> Self {
        let outer = outer.to_string();
        match self {
            FetchError::Transport { context, source } => FetchError::Transport {
                context: format!("{} {}", outer, context),
                source,
            },
            FetchError::Decode {
                context,
                message,
                snippet,
            } => FetchError::Decode {
                context: format!("{} {}", outer, context),
                message,
                snippet,
            },
            FetchError::HttpStatus { context, status } => FetchError::HttpStatus {
                context: format!("{} {}", outer, context),
                status,
            },
            FetchError::Cancelled { context, skipped } => FetchError::Cancelled {
                context: format!("{} {}", outer, context),
                skipped,
            },
            FetchError::Aggregate(inner) => {
                FetchError::Aggregate(inner.into_iter().map(|e| e.within(outer.as_str())).collect())
            }
        }
    }

    /// Combines sibling failures into one error, or `None` when nothing failed.
    ///
    /// Nested aggregates are flattened so the report stays one level deep.
    pub fn aggregate(errors: Vec<FetchError>) -> Option<FetchError> {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                FetchError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        if flat.is_empty() {
            None
        } else {
            Some(FetchError::Aggregate(flat))
        }
    }

    /// Number of individual failures this error stands for.
    pub fn count(&self) -> usize {
        match self {
            FetchError::Aggregate(inner) => inner.iter().map(FetchError::count).sum(),
            _ => 1,
        }
    }

    /// Whether any part of this error comes from a cancelled pool, i.e. the
    /// unit of work it describes is incomplete.
    pub fn is_cancelled(&self) -> bool {
        match self {
            FetchError::Cancelled { .. } => true,
            FetchError::Aggregate(inner) => inner.iter().any(FetchError::is_cancelled),
            _ => false,
        }
    }
}

struct AggregateDisplay<'a>(&'a [FetchError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fetch(es) failed [errors=", self.0.len())?;
        for error in self.0 {
            write!(f, "\n  {}", error)?;
        }
        write!(f, "\n]")
    }
}

fn snippet(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}
