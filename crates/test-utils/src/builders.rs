#![allow(dead_code)]

use std::collections::BTreeMap;

use stackdag::catalog::Unit;
use stackdag::config::{ConfigFile, RawConfigFile, ScriptConfig, StackConfig};
use stackdag::types::OrderRef;

/// Builder for a catalog `Unit`.
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    unit: Unit,
}

impl UnitBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            unit: Unit::new(path),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.unit.id = Some(id.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.unit.tags.insert(tag.to_string());
        self
    }

    pub fn after(mut self, entry: &str) -> Self {
        self.unit.after.push(parse(entry));
        self
    }

    pub fn before(mut self, entry: &str) -> Self {
        self.unit.before.push(parse(entry));
        self
    }

    pub fn wants(mut self, entry: &str) -> Self {
        self.unit.wants.push(parse(entry));
        self
    }

    pub fn wanted_by(mut self, entry: &str) -> Self {
        self.unit.wanted_by.push(parse(entry));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.unit.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Unit {
        self.unit
    }
}

fn parse(entry: &str) -> OrderRef {
    entry
        .parse()
        .unwrap_or_else(|e| panic!("bad clause entry {entry:?} in test: {e}"))
}

/// Build a catalog from unit builders.
pub fn catalog(units: impl IntoIterator<Item = UnitBuilder>) -> Vec<Unit> {
    units.into_iter().map(UnitBuilder::build).collect()
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_stack(mut self, path: &str, stack: StackConfig) -> Self {
        self.config.stack.insert(path.to_string(), stack);
        self
    }

    pub fn with_script(mut self, name: &str, jobs: &[&[&str]]) -> Self {
        self.config.script.insert(
            name.to_string(),
            ScriptConfig {
                description: None,
                jobs: jobs
                    .iter()
                    .map(|job| job.iter().map(|s| s.to_string()).collect())
                    .collect(),
            },
        );
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn parallel(mut self, n: usize) -> Self {
        self.config.config.parallel = n;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StackConfig`.
#[derive(Debug, Clone, Default)]
pub struct StackConfigBuilder {
    stack: StackConfig,
}

impl StackConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.stack.id = Some(id.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.stack.tags.push(tag.to_string());
        self
    }

    pub fn after(mut self, entry: &str) -> Self {
        self.stack.after.push(entry.to_string());
        self
    }

    pub fn before(mut self, entry: &str) -> Self {
        self.stack.before.push(entry.to_string());
        self
    }

    pub fn wants(mut self, entry: &str) -> Self {
        self.stack.wants.push(entry.to_string());
        self
    }

    pub fn wanted_by(mut self, entry: &str) -> Self {
        self.stack.wanted_by.push(entry.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.stack
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> StackConfig {
        self.stack
    }
}

/// Environment map literal for tests.
pub fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
