//! Read-only view of the process environment.
//!
//! Resolution code asks an [`Environment`] rather than `std::env` so that
//! callers (and tests) can supply a fixed snapshot.

use std::collections::BTreeMap;

/// Source of environment variables.
pub trait Environment {
    /// Value of `key`, if set and valid UTF-8.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    vars: BTreeMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl Environment for MapEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_environment_lookup() {
        let env = MapEnvironment::new().with("VITIS", "/opt/vitis");
        assert_eq!(env.var("VITIS").as_deref(), Some("/opt/vitis"));
        assert!(env.var("PATH").is_none());
    }
}
