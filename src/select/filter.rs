// src/select/filter.rs

//! Root selection: tag filters, scope directory and change restriction.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::catalog::path::{is_within, normalize};
use crate::catalog::{Unit, UnitPath};
use crate::errors::{Result, StackdagError};
use crate::types::TAG_QUERY_PREFIX;

fn tag_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid tag regex"))
}

/// Validate one plain tag name used in `--tags` / `--no-tags`.
pub fn validate_tag_name(tag: &str) -> Result<()> {
    if tag.starts_with(TAG_QUERY_PREFIX) {
        return Err(StackdagError::InvalidTagSyntax(
            tag.to_string(),
            "tag filters take plain tag names, not tag:<query>".to_string(),
        ));
    }
    if !tag_name_regex().is_match(tag) {
        return Err(StackdagError::InvalidTagSyntax(
            tag.to_string(),
            "expected letters, digits, '_', '-' or '.'".to_string(),
        ));
    }
    Ok(())
}

/// Include / exclude tag filter.
///
/// A unit passes iff `(include empty OR tags ∩ include ≠ ∅)` and
/// `(exclude empty OR tags ∩ exclude = ∅)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let collect = |tags: Vec<String>| -> Result<BTreeSet<String>> {
            tags.into_iter()
                .map(|t| {
                    validate_tag_name(&t)?;
                    Ok(t)
                })
                .collect()
        };

        Ok(Self {
            include: collect(include.into_iter().map(|s| s.as_ref().trim().to_string()).collect())?,
            exclude: collect(exclude.into_iter().map(|s| s.as_ref().trim().to_string()).collect())?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|t| tags.contains(t));
        let excluded = !self.exclude.is_empty() && self.exclude.iter().any(|t| tags.contains(t));
        included && !excluded
    }
}

/// Produces the candidate (root) set from the catalog.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    filter: TagFilter,
    scope: Option<UnitPath>,
    restrict: Option<HashSet<UnitPath>>,
}

impl Selector {
    pub fn new(filter: TagFilter) -> Self {
        Self {
            filter,
            scope: None,
            restrict: None,
        }
    }

    /// Only select units at or below `dir`.
    pub fn with_scope(mut self, dir: &str) -> Result<Self> {
        let scope = normalize("/", dir).ok_or_else(|| {
            StackdagError::ConfigError(format!("scope {dir:?} escapes the project root"))
        })?;
        self.scope = Some(scope);
        Ok(self)
    }

    /// Only select units whose path is in `paths` (change detection).
    pub fn with_restriction(mut self, paths: HashSet<UnitPath>) -> Self {
        self.restrict = Some(paths);
        self
    }

    pub fn accepts(&self, unit: &Unit) -> bool {
        if let Some(scope) = &self.scope {
            if !is_within(scope, &unit.path) {
                return false;
            }
        }
        if let Some(restrict) = &self.restrict {
            if !restrict.contains(&unit.path) {
                return false;
            }
        }
        self.filter.matches(&unit.tags)
    }

    /// Candidate unit paths, sorted.
    pub fn select(&self, units: &[Unit]) -> Vec<UnitPath> {
        let mut selected: Vec<UnitPath> = units
            .iter()
            .filter(|u| self.accepts(u))
            .map(|u| u.path.clone())
            .collect();
        selected.sort();

        debug!(
            total = units.len(),
            selected = selected.len(),
            "selector applied tag/scope/change filters"
        );

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(path: &str, tags: &[&str]) -> Unit {
        let mut unit = Unit::new(path);
        unit.tags = tags.iter().map(|t| t.to_string()).collect();
        unit
    }

    #[test]
    fn include_and_exclude_combine() {
        let filter = TagFilter::new(["infra", "k8s"], ["prod"]).unwrap();
        let tags = |t: &[&str]| t.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();

        assert!(filter.matches(&tags(&["infra"])));
        assert!(filter.matches(&tags(&["k8s", "dev"])));
        assert!(!filter.matches(&tags(&["infra", "prod"])));
        assert!(!filter.matches(&tags(&["other"])));
        assert!(TagFilter::default().matches(&tags(&[])));
    }

    #[test]
    fn tag_query_syntax_rejected_in_filters() {
        let err = TagFilter::new(["tag:infra"], Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, StackdagError::InvalidTagSyntax(ref t, _) if t == "tag:infra"));

        let err = TagFilter::new(Vec::<String>::new(), ["bad tag"]).unwrap_err();
        assert!(matches!(err, StackdagError::InvalidTagSyntax(..)));

        assert!(TagFilter::new([""], Vec::<String>::new()).is_err());
    }

    #[test]
    fn selector_applies_scope_and_restriction() {
        let units = vec![
            tagged("/b", &["infra"]),
            tagged("/a", &["infra"]),
            tagged("/apps/web", &["infra"]),
            tagged("/c", &[]),
        ];

        let all = Selector::new(TagFilter::new(["infra"], Vec::<String>::new()).unwrap());
        assert_eq!(all.select(&units), vec!["/a", "/apps/web", "/b"]);

        let scoped = Selector::default().with_scope("apps").unwrap();
        assert_eq!(scoped.select(&units), vec!["/apps/web"]);

        let changed = Selector::default()
            .with_restriction(["/c".to_string(), "/a".to_string()].into_iter().collect());
        assert_eq!(changed.select(&units), vec!["/a", "/c"]);
    }
}
