//! Dynamic inventory document
//!
//! The JSON shape jeti reads from an inventory program: a mapping from group
//! name to a group object, with per-host variables under `all.hostvars`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the group that carries per-host variables
pub const ALL_GROUP: &str = "all";

/// Errors that can occur when rendering an inventory
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Failed to serialize the inventory
    #[error("Failed to serialize inventory: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A single inventory group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Hosts that belong to the group, in insertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Variables applied to every host in the group
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub vars: Map<String, Value>,
}

/// Groups plus per-host variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    groups: BTreeMap<String, Group>,
    hostvars: BTreeMap<String, Value>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `host` to `group`, creating the group on first use
    pub fn add_host(&mut self, group: &str, host: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .hosts
            .push(host.to_string());
    }

    /// Sets a group variable, creating the group on first use
    pub fn set_group_var(&mut self, group: &str, key: &str, value: impl Into<Value>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .vars
            .insert(key.to_string(), value.into());
    }

    /// Puts `group` under `name`, dropping any group already there
    pub fn set_group(&mut self, name: &str, group: Group) -> Option<Group> {
        self.groups.insert(name.to_string(), group)
    }

    /// Replaces the variables of a host
    pub fn set_hostvars(&mut self, host: &str, vars: Value) {
        self.hostvars.insert(host.to_string(), vars);
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Variables for a single host, or an empty object for unknown hosts
    pub fn host_vars(&self, host: &str) -> Value {
        self.hostvars
            .get(host)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Builds the JSON value handed to jeti
    ///
    /// When hostvars are present, `all` is written as `{"hostvars": ...}` and
    /// replaces any group of the same name.
    pub fn to_value(&self) -> Result<Value, InventoryError> {
        let mut out = Map::new();
        for (name, group) in &self.groups {
            out.insert(name.clone(), serde_json::to_value(group)?);
        }
        if !self.hostvars.is_empty() {
            let mut all = Map::new();
            all.insert("hostvars".to_string(), serde_json::to_value(&self.hostvars)?);
            out.insert(ALL_GROUP.to_string(), Value::Object(all));
        }
        Ok(Value::Object(out))
    }

    /// Serializes with sorted keys and two-space indentation
    pub fn to_json(&self) -> Result<String, InventoryError> {
        Ok(serde_json::to_string_pretty(&self.to_value()?)?)
    }
}

/// Renders the empty object printed for `--host` lookups with no variables
pub fn empty_json() -> String {
    Value::Object(Map::new()).to_string()
}
