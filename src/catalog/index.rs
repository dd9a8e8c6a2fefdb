// src/catalog/index.rs

//! Lookup structure over a unit list, used to resolve clause entries.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::catalog::path::{is_within, normalize};
use crate::catalog::Unit;
use crate::types::OrderRef;

/// Result of resolving one clause entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Matching unit paths, sorted. May be empty for a tag query.
    Units(Vec<&'a str>),
    /// The entry points nowhere useful; the caller warns and skips it.
    Invalid(String),
}

/// Sorted view over the catalog keyed by unit path.
#[derive(Debug, Clone)]
pub struct CatalogIndex<'a> {
    units: BTreeMap<&'a str, &'a Unit>,
}

impl<'a> CatalogIndex<'a> {
    pub fn new(units: &'a [Unit]) -> Self {
        let units = units.iter().map(|u| (u.path.as_str(), u)).collect();
        Self { units }
    }

    pub fn get(&self, path: &str) -> Option<&'a Unit> {
        self.units.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.units.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// All units in path order.
    pub fn units(&self) -> impl Iterator<Item = &'a Unit> + '_ {
        self.units.values().copied()
    }

    /// Units at `dir` or nested anywhere below it, in path order.
    pub fn under(&self, dir: &str) -> Vec<&'a str> {
        self.units
            .range::<str, _>((Bound::Included(dir), Bound::Unbounded))
            .map(|(path, _)| *path)
            .take_while(|path| path.starts_with(dir))
            .filter(|path| is_within(dir, path))
            .collect()
    }

    /// Units carrying `tag`, in path order.
    pub fn tagged(&self, tag: &str) -> Vec<&'a str> {
        self.units
            .iter()
            .filter(|(_, unit)| unit.has_tag(tag))
            .map(|(path, _)| *path)
            .collect()
    }

    /// Resolve one clause entry declared by `unit`.
    ///
    /// A tag query matches every catalog unit carrying the tag. A path entry
    /// matches the unit at that path plus every unit nested below it; a path
    /// with no unit at or below it is invalid.
    pub fn resolve(&self, unit: &Unit, entry: &OrderRef) -> Resolution<'a> {
        match entry {
            OrderRef::Tag(tag) => Resolution::Units(self.tagged(tag)),
            OrderRef::Path(reference) => {
                let Some(target) = normalize(&unit.path, reference) else {
                    return Resolution::Invalid("path escapes the project root".to_string());
                };
                let found = self.under(&target);
                if found.is_empty() {
                    Resolution::Invalid(format!("no unit at or below {target}"))
                } else {
                    Resolution::Units(found)
                }
            }
        }
    }
}
