//! Server normalization
//!
//! Turns a raw Nova server into the hostvars published under `all.hostvars`,
//! resolving addresses and (optionally) flavor and image names.

use std::collections::{BTreeMap, HashMap};
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use serde_json::Value;

use super::client::{NovaAddress, NovaServer, ProjectRef};

/// Where a server lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub cloud: String,
    pub region_name: String,
    pub zone: Option<String>,
    pub project: ProjectRef,
}

/// A flavor or image reference; `name` is omitted when unknown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamedRef {
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Hostvars of one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerVars {
    pub id: String,
    pub name: String,
    pub status: String,
    pub metadata: BTreeMap<String, String>,
    pub flavor: NamedRef,
    pub image: NamedRef,
    pub az: String,
    pub cloud: String,
    pub region: String,
    pub location: Location,
    pub addresses: BTreeMap<String, Vec<NovaAddress>>,
    pub key_name: Option<String>,
    pub private_v4: String,
    pub public_v4: String,
    pub public_v6: String,
    pub interface_ip: String,
}

/// Per cloud-region inputs to normalization
#[derive(Debug, Clone, Default)]
pub struct ServerContext {
    pub cloud: String,
    pub region: String,
    pub project: ProjectRef,
    /// Prefer the private address for `interface_ip`
    pub private: bool,
    pub flavor_names: HashMap<String, String>,
    pub image_names: HashMap<String, String>,
}

/// Addresses picked from a server's networks
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddressSummary {
    pub private_v4: String,
    pub public_v4: String,
    pub public_v6: String,
}

fn is_global_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    !ip.is_loopback() && !ip.is_unspecified() && (first & 0xffc0) != 0xfe80 && (first & 0xfe00) != 0xfc00
}

/// Picks private and public addresses
///
/// Floating IPs are public; a fixed IPv4 is public unless it is in a private
/// range. The private address falls back to the first fixed IPv4.
pub fn summarize_addresses(addresses: &BTreeMap<String, Vec<NovaAddress>>) -> AddressSummary {
    let mut floating_v4 = None;
    let mut public_fixed_v4 = None;
    let mut private_v4 = None;
    let mut any_fixed_v4 = None;
    let mut public_v6 = None;

    for addr in addresses.values().flatten() {
        let floating = addr.kind.as_deref() == Some("floating");
        match addr.version {
            6 => {
                if let Ok(ip) = addr.addr.parse::<Ipv6Addr>() {
                    if is_global_v6(&ip) {
                        public_v6.get_or_insert_with(|| addr.addr.clone());
                    }
                }
            }
            _ => {
                let Ok(ip) = addr.addr.parse::<Ipv4Addr>() else {
                    continue;
                };
                if floating {
                    floating_v4.get_or_insert_with(|| addr.addr.clone());
                    continue;
                }
                any_fixed_v4.get_or_insert_with(|| addr.addr.clone());
                if ip.is_private() || ip.is_loopback() || ip.is_link_local() {
                    private_v4.get_or_insert_with(|| addr.addr.clone());
                } else {
                    public_fixed_v4.get_or_insert_with(|| addr.addr.clone());
                }
            }
        }
    }

    AddressSummary {
        private_v4: private_v4.or(any_fixed_v4).unwrap_or_default(),
        public_v4: floating_v4.or(public_fixed_v4).unwrap_or_default(),
        public_v6: public_v6.unwrap_or_default(),
    }
}

/// Address jeti should connect to
pub fn interface_ip(summary: &AddressSummary, private: bool) -> String {
    let candidates = if private {
        [&summary.private_v4, &summary.public_v4, &summary.public_v6]
    } else {
        [&summary.public_v4, &summary.public_v6, &summary.private_v4]
    };
    candidates
        .into_iter()
        .find(|ip| !ip.is_empty())
        .cloned()
        .unwrap_or_default()
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn resolve_ref(raw: &Value, names: &HashMap<String, String>) -> NamedRef {
    let id = string_field(raw, "id");
    let name = string_field(raw, "name")
        .or_else(|| string_field(raw, "original_name"))
        .or_else(|| id.as_ref().and_then(|id| names.get(id).cloned()));
    NamedRef { id, name }
}

/// Builds hostvars for a server
pub fn normalize(server: NovaServer, ctx: &ServerContext) -> ServerVars {
    let summary = summarize_addresses(&server.addresses);
    let interface_ip = interface_ip(&summary, ctx.private);
    let az = server.availability_zone.clone().unwrap_or_default();
    let mut project = ctx.project.clone();
    if project.id.is_none() {
        project.id = server.tenant_id.clone();
    }

    ServerVars {
        flavor: resolve_ref(&server.flavor, &ctx.flavor_names),
        image: resolve_ref(&server.image, &ctx.image_names),
        location: Location {
            cloud: ctx.cloud.clone(),
            region_name: ctx.region.clone(),
            zone: server.availability_zone,
            project,
        },
        id: server.id,
        name: server.name,
        status: server.status,
        metadata: server.metadata,
        az,
        cloud: ctx.cloud.clone(),
        region: ctx.region.clone(),
        addresses: server.addresses,
        key_name: server.key_name,
        private_v4: summary.private_v4,
        public_v4: summary.public_v4,
        public_v6: summary.public_v6,
        interface_ip,
    }
}
