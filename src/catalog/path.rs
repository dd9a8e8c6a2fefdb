// src/catalog/path.rs

//! Project-path helpers.
//!
//! Unit paths are project-absolute, `/`-separated and normalized
//! (`/`, `/infra`, `/infra/db`). They are plain strings so they sort
//! lexicographically, which is the tie-break order used everywhere.

/// Resolve `reference` against the unit directory `base`.
///
/// Absolute references (`/x/y`) are rooted at the project; relative ones
/// (`../x`) are joined onto `base`. `.` and `..` segments are folded.
/// Returns `None` if the reference climbs above the project root.
pub fn normalize(base: &str, reference: &str) -> Option<String> {
    let joined = if reference.starts_with('/') {
        reference.to_string()
    } else {
        format!("{base}/{reference}")
    };

    let mut parts: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }

    Some(format!("/{}", parts.join("/")))
}

/// Whether `descendant` lives strictly below the directory `ancestor`.
pub fn is_nested(ancestor: &str, descendant: &str) -> bool {
    if ancestor == descendant {
        return false;
    }
    if ancestor == "/" {
        return descendant.starts_with('/');
    }
    descendant
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether `path` is `dir` itself or nested below it.
pub fn is_within(dir: &str, path: &str) -> bool {
    dir == path || is_nested(dir, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_absolute_and_relative_references() {
        assert_eq!(normalize("/a/b", "/c").as_deref(), Some("/c"));
        assert_eq!(normalize("/a/b", "../c").as_deref(), Some("/a/c"));
        assert_eq!(normalize("/a/b", "./d/./e/").as_deref(), Some("/a/b/d/e"));
        assert_eq!(normalize("/", "x//y").as_deref(), Some("/x/y"));
        assert_eq!(normalize("/a", "../..").as_deref(), None);
        assert_eq!(normalize("/a", "..").as_deref(), Some("/"));
    }

    #[test]
    fn nesting_is_strict_and_segment_aware() {
        assert!(is_nested("/a", "/a/b"));
        assert!(is_nested("/", "/a"));
        assert!(!is_nested("/a", "/a"));
        assert!(!is_nested("/a", "/ab"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/a/b", "/a"));
    }
}
