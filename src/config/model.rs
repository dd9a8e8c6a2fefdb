// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::catalog::{Unit, UnitCatalog};
use crate::exec::Job;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// parallel = 4
/// continue_on_error = false
///
/// [env]
/// TF_IN_AUTOMATION = "1"
///
/// [script.deploy]
/// jobs = [["terraform", "init"], ["terraform", "apply"]]
///
/// [stack."/network"]
/// tags = ["infra"]
/// after = ["/base", "tag:core"]
/// ```
///
/// All sections are optional at this stage; [`ConfigFile`] enforces the
/// rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Environment added to every job, from `[env]`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Named job sequences from `[script.<name>]`.
    #[serde(default)]
    pub script: BTreeMap<String, ScriptConfig>,

    /// All units from `[stack."<path>"]`, keyed by project path.
    #[serde(default)]
    pub stack: BTreeMap<String, StackConfig>,
}

/// `[config]` section. Every value can be overridden on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of units running at once.
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub reverse: bool,
}

fn default_parallel() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            continue_on_error: false,
            reverse: false,
        }
    }
}

/// `[script.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Run in order inside each unit; the first failure stops the unit.
    pub jobs: Vec<Job>,
}

/// `[stack."<path>"]` section. Clause entries are raw strings here and are
/// parsed during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Units (or `tag:` queries) that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Units (or `tag:` queries) that must wait for this one.
    #[serde(default)]
    pub before: Vec<String>,

    /// Units pulled into any run that selects this one.
    #[serde(default)]
    pub wants: Vec<String>,

    /// Units that pull this one in when they are selected.
    #[serde(default)]
    pub wanted_by: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so every unit path is
/// normalized and unique and every clause entry is parsed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub env: BTreeMap<String, String>,
    pub script: BTreeMap<String, ScriptConfig>,
    units: Vec<Unit>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        env: BTreeMap<String, String>,
        script: BTreeMap<String, ScriptConfig>,
        units: Vec<Unit>,
    ) -> Self {
        Self {
            config,
            env,
            script,
            units,
        }
    }

    /// Units sorted by path.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn script(&self, name: &str) -> Option<&ScriptConfig> {
        self.script.get(name)
    }
}

impl UnitCatalog for ConfigFile {
    fn list_units(&self) -> Vec<Unit> {
        self.units.clone()
    }
}
