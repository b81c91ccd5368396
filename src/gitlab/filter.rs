// src/gitlab/filter.rs
// =============================================================================
// Decides which files are not worth downloading.
//
// A path is avoided when it has no '.' at all (extensionless files are
// usually binaries) or when it contains any of the markers below anywhere in
// the path. Matching is plain substring containment, not suffix matching, so
// `assets/foo.png/readme.go` is avoided too. Markers are case-sensitive.
// =============================================================================

/// Substrings that mark a path as not worth fetching.
pub const AVOIDED_MARKERS: &[&str] = &[
    ".git/",
    "package-lock.json",
    ".js.map",
    ".css.map",
    ".min.",
    ".png",
    ".jpeg",
    ".jpg",
    ".webp",
    ".ico",
    ".pdf",
    ".icc",
    ".image",
    ".db",
    ".exe",
];

/// Returns true when the content of `path` should not be fetched.
pub fn avoid_file(path: &str) -> bool {
    if !path.contains('.') {
        return true;
    }

    AVOIDED_MARKERS.iter().any(|marker| path.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_files_are_fetched() {
        assert!(!avoid_file("README.md"));
        assert!(!avoid_file("cmd/server/main.go"));
        assert!(!avoid_file("src/app.js"));
    }

    #[test]
    fn test_extensionless_paths_are_avoided() {
        assert!(avoid_file("Makefile"));
        assert!(avoid_file("bin/server"));
    }

    #[test]
    fn test_denylisted_markers_are_avoided() {
        assert!(avoid_file("bin/app.exe"));
        assert!(avoid_file(".git/config"));
        assert!(avoid_file("src/app.min.js"));
        assert!(avoid_file("static/logo.png"));
        assert!(avoid_file("frontend/package-lock.json"));
        assert!(avoid_file("dist/bundle.js.map"));
        assert!(avoid_file("data/cache.db"));
    }

    #[test]
    fn test_match_is_substring_not_suffix() {
        assert!(avoid_file("foo.png/bar.go"));
        assert!(avoid_file("docs/diagram.pdf.txt"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert!(!avoid_file("image.PNG"));
    }
}
