// src/config/validate.rs

use std::collections::{BTreeMap, HashMap};

use crate::catalog::path::normalize;
use crate::catalog::Unit;
use crate::config::model::{ConfigFile, RawConfigFile, StackConfig};
use crate::errors::{Result, StackdagError};
use crate::select::validate_tag_name;
use crate::types::OrderRef;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StackdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_stacks(&raw)?;
        validate_global_config(&raw)?;
        validate_scripts(&raw)?;

        let units = build_units(&raw.stack)?;
        ensure_unique_ids(&units)?;
        for unit in &units {
            unit.check_selection_clauses()?;
        }

        Ok(ConfigFile::new_unchecked(raw.config, raw.env, raw.script, units))
    }
}

fn ensure_has_stacks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.stack.is_empty() {
        return Err(StackdagError::ConfigError(
            "config must contain at least one [stack.\"<path>\"] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.parallel == 0 {
        return Err(StackdagError::ConfigError(
            "[config].parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_scripts(cfg: &RawConfigFile) -> Result<()> {
    for (name, script) in cfg.script.iter() {
        if script.jobs.is_empty() {
            return Err(StackdagError::ConfigError(format!(
                "script '{name}' has no jobs"
            )));
        }
        for (n, job) in script.jobs.iter().enumerate() {
            if job.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(StackdagError::ConfigError(format!(
                    "script '{name}' job #{n} has an empty command"
                )));
            }
        }
    }
    Ok(())
}

fn build_units(stacks: &BTreeMap<String, StackConfig>) -> Result<Vec<Unit>> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut units = Vec::with_capacity(stacks.len());

    for (key, stack) in stacks.iter() {
        if !key.starts_with('/') {
            return Err(StackdagError::ConfigError(format!(
                "stack path '{key}' must be absolute (start with '/')"
            )));
        }
        let path = normalize("/", key).ok_or_else(|| {
            StackdagError::ConfigError(format!("stack path '{key}' escapes the project root"))
        })?;
        if let Some(other) = seen.insert(path.clone(), key) {
            return Err(StackdagError::ConfigError(format!(
                "stack paths '{other}' and '{key}' both normalize to '{path}'"
            )));
        }

        for tag in &stack.tags {
            validate_tag_name(tag)?;
        }

        units.push(Unit {
            id: stack.id.clone(),
            tags: stack.tags.iter().cloned().collect(),
            after: parse_clause(&path, "after", &stack.after)?,
            before: parse_clause(&path, "before", &stack.before)?,
            wants: parse_clause(&path, "wants", &stack.wants)?,
            wanted_by: parse_clause(&path, "wanted_by", &stack.wanted_by)?,
            env: stack.env.clone(),
            path,
        });
    }

    units.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(units)
}

fn parse_clause(unit: &str, clause: &str, entries: &[String]) -> Result<Vec<OrderRef>> {
    entries
        .iter()
        .map(|entry| {
            entry.parse::<OrderRef>().map_err(|reason| {
                StackdagError::ConfigError(format!(
                    "stack '{unit}' has an invalid `{clause}` entry {entry:?}: {reason}"
                ))
            })
        })
        .collect()
}

fn ensure_unique_ids(units: &[Unit]) -> Result<()> {
    let mut ids: HashMap<&str, &str> = HashMap::new();
    for unit in units {
        if let Some(id) = unit.id.as_deref() {
            if let Some(other) = ids.insert(id, &unit.path) {
                return Err(StackdagError::ConfigError(format!(
                    "stacks '{other}' and '{}' share the id '{id}'",
                    unit.path
                )));
            }
        }
    }
    Ok(())
}
