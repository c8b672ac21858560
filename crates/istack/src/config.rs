//! Device configuration.

use serde::Deserialize;

use crate::error::StackError;
use crate::stack::Capacity;

/// Name the device is published under when nothing else is configured.
pub const DEFAULT_DEVICE_NAME: &str = "int_stack";

/// Configuration for a [`StackDevice`](crate::device::StackDevice).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name used in log events
    pub name: String,
    /// Capacity of the stack at creation
    pub default_capacity: Capacity,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            default_capacity: Capacity::default(),
        }
    }
}

impl DeviceConfig {
    /// Defaults overridden by `INT_STACK_NAME` and `INT_STACK_CAPACITY`.
    ///
    /// An unparseable or zero capacity is an error rather than a silent
    /// fallback.
    pub fn from_env() -> Result<Self, StackError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StackError> {
        let mut config = Self::default();
        if let Some(name) = lookup("INT_STACK_NAME") {
            config.name = name;
        }
        if let Some(capacity) = lookup("INT_STACK_CAPACITY") {
            config.default_capacity = capacity.parse()?;
        }
        Ok(config)
    }

    /// Same config with a different initial capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.default_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DeviceConfig::default());
        assert_eq!(config.name, "int_stack");
        assert_eq!(config.default_capacity.get(), 1024);
    }

    #[test]
    fn test_env_overrides() {
        let config = DeviceConfig::from_lookup(lookup(&[
            ("INT_STACK_NAME", "scratch"),
            ("INT_STACK_CAPACITY", "8"),
        ]))
        .unwrap();
        assert_eq!(config.name, "scratch");
        assert_eq!(config.default_capacity.get(), 8);
    }

    #[test]
    fn test_bad_capacity_rejected() {
        for bad in ["0", "-2", "lots"] {
            let result = DeviceConfig::from_lookup(lookup(&[("INT_STACK_CAPACITY", bad)]));
            assert!(matches!(result, Err(StackError::InvalidArgument(_))), "{}", bad);
        }
    }

    #[test]
    fn test_deserialize_partial() {
        let config: DeviceConfig = serde_json::from_str(r#"{"default_capacity": 32}"#).unwrap();
        assert_eq!(config.name, "int_stack");
        assert_eq!(config.default_capacity.get(), 32);

        assert!(serde_json::from_str::<DeviceConfig>(r#"{"default_capacity": 0}"#).is_err());
    }
}
