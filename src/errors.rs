// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// The ordering graph of the selected units is not acyclic.
    ///
    /// `chain` holds the full cycle, first node repeated at the end.
    #[error("Cycle detected in ordering graph: {}", .chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },

    /// A `tag:` query was used in a clause that only accepts paths.
    #[error("tag:<query> is not allowed in {clause:?} (unit {unit}, entry {entry:?})")]
    FilterNotAllowed {
        unit: String,
        clause: String,
        entry: String,
    },

    #[error("Invalid tag filter {0:?}: {1}")]
    InvalidTagSyntax(String, String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StackdagError>;
