use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix marking a tag query inside an ordering or selection clause.
pub const TAG_QUERY_PREFIX: &str = "tag:";

/// One entry of an `after` / `before` / `wants` / `wanted_by` clause.
///
/// - `Path`: a literal unit or directory reference, absolute (`/infra/db`,
///   rooted at the project) or relative to the referencing unit (`../db`).
/// - `Tag`: a `tag:<name>` query matching every unit carrying that tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderRef {
    Path(String),
    Tag(String),
}

impl OrderRef {
    pub fn is_tag_query(&self) -> bool {
        matches!(self, OrderRef::Tag(_))
    }
}

impl FromStr for OrderRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(tag) = s.strip_prefix(TAG_QUERY_PREFIX) {
            if tag.is_empty() {
                return Err(format!("empty tag query {s:?}"));
            }
            return Ok(OrderRef::Tag(tag.to_string()));
        }
        if s.is_empty() {
            return Err("empty path reference".to_string());
        }
        Ok(OrderRef::Path(s.to_string()))
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderRef::Path(p) => write!(f, "{p}"),
            OrderRef::Tag(t) => write!(f, "{TAG_QUERY_PREFIX}{t}"),
        }
    }
}

/// Lifecycle status of a selected unit within one invocation.
///
/// Transitions are one-directional:
/// `Pending -> Running -> {Ok, Failed, Canceled}` or `Pending -> Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Running,
    Ok,
    Failed,
    Canceled,
}

impl UnitStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Ok | UnitStatus::Failed | UnitStatus::Canceled)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Running => "running",
            UnitStatus::Ok => "ok",
            UnitStatus::Failed => "failed",
            UnitStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Output format for `stackdag graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    #[default]
    Dot,
    Json,
}

impl FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dot" => Ok(GraphFormat::Dot),
            "json" => Ok(GraphFormat::Json),
            other => Err(format!(
                "invalid graph format: {other} (expected \"dot\" or \"json\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_queries_and_paths() {
        assert_eq!("tag:infra".parse(), Ok(OrderRef::Tag("infra".into())));
        assert_eq!(" /a/b ".parse(), Ok(OrderRef::Path("/a/b".into())));
        assert!("tag:".parse::<OrderRef>().is_err());
        assert!("".parse::<OrderRef>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!UnitStatus::Pending.is_terminal());
        assert!(!UnitStatus::Running.is_terminal());
        assert!(UnitStatus::Ok.is_terminal());
        assert!(UnitStatus::Failed.is_terminal());
        assert!(UnitStatus::Canceled.is_terminal());
    }
}
