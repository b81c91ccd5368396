// src/search/matcher.rs
// =============================================================================
// Greps mirrored file contents.
//
// A plain linear scan: decode each file's base64 content, walk its lines, and
// report every line the regex matches together with up to `context` lines on
// either side. Nothing here is concurrent.
// =============================================================================

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde::Serialize;

use crate::gitlab::ProjectRecord;

const HIGHLIGHT: &str = "\x1b[1;36m";
const RESET: &str = "\x1b[0m";

/// One matching line and its surroundings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// 1-based.
    pub line_number: usize,
    pub before: Vec<String>,
    pub line: String,
    pub after: Vec<String>,
}

impl Match {
    /// The snippet as printed in a terminal, with the match highlighted.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.before {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(HIGHLIGHT);
        out.push_str(&self.line);
        out.push_str(RESET);
        out.push('\n');
        for line in &self.after {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// A match located in a mirrored file.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub project: String,
    pub path: String,
    #[serde(flatten)]
    pub found: Match,
}

/// Every line of `content` matching `regex`, with `context` lines around it.
pub fn find_matches(regex: &Regex, content: &str, context: usize) -> Vec<Match> {
    let lines: Vec<&str> = content.lines().collect();
    let mut found = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !regex.is_match(line) {
            continue;
        }

        let first = i.saturating_sub(context);
        let last = (i + context).min(lines.len() - 1);

        found.push(Match {
            line_number: i + 1,
            before: lines[first..i].iter().map(|l| l.to_string()).collect(),
            line: line.to_string(),
            after: lines[i + 1..=last].iter().map(|l| l.to_string()).collect(),
        });
    }

    found
}

/// Searches every file of every project for `pattern`.
///
/// A context of 0 is treated as 1. Files without content are skipped; a
/// file whose content is not valid base64 is logged and skipped.
pub fn search_projects(projects: &[ProjectRecord], pattern: &str, context: usize) -> Result<Vec<Hit>> {
    let regex = Regex::new(pattern).with_context(|| format!("invalid pattern [regex={}]", pattern))?;
    let context = context.max(1);
    let mut hits = Vec::new();

    for project in projects {
        tracing::debug!(project = %project.name, "checking project");

        for file in project.files.iter().filter(|f| f.has_content()) {
            let text = match decode_content(&file.content) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(project = %project.name, path = %file.path, error = %e, "failed to decode content");
                    continue;
                }
            };

            for found in find_matches(&regex, &text, context) {
                hits.push(Hit {
                    project: project.name.clone(),
                    path: file.path.clone(),
                    found,
                });
            }
        }
    }

    Ok(hits)
}

/// GitLab wraps long base64 bodies; whitespace is stripped before decoding.
fn decode_content(content: &str) -> Result<String> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).context("content is not valid base64")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::FileRecord;

    fn encoded(text: &str) -> String {
        STANDARD.encode(text)
    }

    fn project(name: &str, files: &[(&str, String)]) -> ProjectRecord {
        ProjectRecord {
            id: 1,
            name: name.to_string(),
            description: None,
            default_branch: Some("main".to_string()),
            files: files
                .iter()
                .map(|(path, content)| FileRecord {
                    id: path.to_string(),
                    name: path.to_string(),
                    path: path.to_string(),
                    content: content.clone(),
                    project_id: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn test_find_matches_with_context() {
        let regex = Regex::new("TODO").unwrap();
        let content = "one\ntwo\n// TODO: fix\nfour\nfive";

        let found = find_matches(&regex, content, 1);
        assert_eq!(
            found,
            vec![Match {
                line_number: 3,
                before: vec!["two".to_string()],
                line: "// TODO: fix".to_string(),
                after: vec!["four".to_string()],
            }]
        );
    }

    #[test]
    fn test_context_is_clamped_at_edges() {
        let regex = Regex::new("^x").unwrap();
        let found = find_matches(&regex, "x first\nmiddle\nx last", 5);

        assert_eq!(found.len(), 2);
        assert!(found[0].before.is_empty());
        assert_eq!(found[0].after, vec!["middle", "x last"]);
        assert_eq!(found[1].before, vec!["x first", "middle"]);
        assert!(found[1].after.is_empty());
    }

    #[test]
    fn test_render_highlights_matched_line() {
        let regex = Regex::new("b").unwrap();
        let rendered = find_matches(&regex, "a\nb\nc", 1)[0].render();
        assert_eq!(rendered, "a\n\x1b[1;36mb\x1b[0m\nc\n");
    }

    #[test]
    fn test_search_projects_decodes_and_skips_empty() {
        let projects = vec![project(
            "api",
            &[
                ("main.go", encoded("package main\n\nfunc main() {}\n")),
                ("logo.png", String::new()),
                ("broken.go", "%%%not base64".to_string()),
            ],
        )];

        let hits = search_projects(&projects, r"func \w+", 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].project, "api");
        assert_eq!(hits[0].path, "main.go");
        assert_eq!(hits[0].found.line_number, 3);
        assert_eq!(hits[0].found.before, vec![""]);
    }

    #[test]
    fn test_wrapped_base64_is_decoded() {
        let mut content = encoded("needle in a haystack");
        content.insert(8, '\n');

        let projects = vec![project("docs", &[("a.md", content)])];
        assert_eq!(search_projects(&projects, "needle", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(search_projects(&[], "(unclosed", 1).is_err());
    }
}
