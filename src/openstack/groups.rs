//! Host grouping
//!
//! Derives group names from server hostvars. Hostvars may come from this
//! crate's own normalization or from a cache written by an older tool, so
//! cloud and region are read from either the top level or `location`.

use std::collections::HashMap;

use serde_json::Value;

use crate::inventory::Inventory;

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Value of `key`, falling back to `location.<nested>` when absent or null
fn top_or_location<'a>(server: &'a Value, key: &str, nested: &str) -> Option<&'a str> {
    match server.get(key) {
        Some(Value::Null) | None => server
            .get("location")
            .and_then(|loc| non_empty_str(loc, nested)),
        Some(value) => value.as_str().filter(|s| !s.is_empty()),
    }
}

/// Group names for one server, in a stable order
pub fn get_groups_from_server(server: &Value) -> Vec<String> {
    let mut groups = Vec::new();

    let cloud = top_or_location(server, "cloud", "cloud");
    if let Some(cloud) = cloud {
        groups.push(cloud.to_string());
    }

    let region = top_or_location(server, "region", "region_name");
    if let Some(region) = region {
        groups.push(region.to_string());
    }

    if let (Some(cloud), Some(region)) = (cloud, region) {
        groups.push(format!("{}_{}", cloud, region));
    }

    let metadata = server.get("metadata");
    if let Some(group) = metadata.and_then(|m| non_empty_str(m, "group")) {
        groups.push(group.to_string());
    }
    if let Some(extra) = metadata.and_then(|m| m.get("groups")).and_then(Value::as_str) {
        groups.extend(
            extra
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
        );
    }

    if let Some(name) = non_empty_str(server, "name") {
        groups.push(name.to_string());
    }

    for key in ["flavor", "image"] {
        if let Some(name) = server.get(key).and_then(|v| non_empty_str(v, "name")) {
            groups.push(format!("{}-{}", key, name));
        }
    }

    if let Some(az) = non_empty_str(server, "az") {
        let region = region.unwrap_or_default();
        let cloud = cloud.unwrap_or_default();
        groups.push(az.to_string());
        groups.push(format!("{}_{}", region, az));
        groups.push(format!("{}_{}_{}", cloud, region, az));
    }

    groups
}

/// Inventory key of a server: its name, or its id when hostnames are off
fn host_key(server: &Value, use_hostnames: bool) -> Option<String> {
    let field = if use_hostnames { "name" } else { "id" };
    server.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Builds the inventory from normalized servers
///
/// Servers without an `interface_ip` are skipped. Servers are bucketed by
/// key in listing order; every server's hostvars are stored under its key and
/// the key is appended to each group derived from it.
pub fn build_inventory(servers: Vec<Value>, use_hostnames: bool) -> Inventory {
    let mut order: Vec<String> = Vec::new();
    let mut firstpass: HashMap<String, Vec<Value>> = HashMap::new();

    for server in servers {
        if non_empty_str(&server, "interface_ip").is_none() {
            tracing::debug!(server = ?server.get("id"), "skipping server without interface ip");
            continue;
        }
        let Some(key) = host_key(&server, use_hostnames) else {
            continue;
        };
        if !firstpass.contains_key(&key) {
            order.push(key.clone());
        }
        firstpass.entry(key).or_default().push(server);
    }

    let mut inventory = Inventory::new();
    for key in order {
        let Some(servers) = firstpass.remove(&key) else {
            continue;
        };
        for server in servers {
            for group in get_groups_from_server(&server) {
                inventory.add_host(&group, &key);
            }
            inventory.set_hostvars(&key, server);
        }
    }
    inventory
}
