//! Keystone and Nova REST client
//!
//! Authenticates against Keystone v3 with a password, picks service endpoints
//! from the returned catalog and lists servers, flavors and images. Listings
//! follow pagination links until the last page.

use std::collections::{BTreeMap, HashMap, HashSet};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::config::{AuthConfig, CloudRegion, ConfigError};
use crate::inventory::InventoryError;

/// Header carrying the issued token
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Header carrying the token on service requests
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Domain used when none is configured
const DEFAULT_DOMAIN: &str = "Default";

/// Errors that can occur when querying an OpenStack cloud
#[derive(Debug, Error)]
pub enum OpenStackError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("{url} returned {status}")]
    Status { status: StatusCode, url: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Cloud has no auth_url
    #[error("auth_url is not configured")]
    MissingAuthUrl,

    /// Keystone did not return a token header
    #[error("Keystone response did not include a token")]
    MissingToken,

    /// Catalog has no endpoint for a required service
    #[error("no {interface} {service} endpoint in region '{region}'")]
    NoEndpoint {
        service: String,
        interface: String,
        region: String,
    },

    /// A single cloud-region failed
    #[error("{cloud}/{region}: {source}")]
    Cloud {
        cloud: String,
        region: String,
        #[source]
        source: Box<OpenStackError>,
    },

    /// Cache file could not be written
    #[error("Cache error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
    project: Option<ProjectRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

/// Project the token is scoped to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A server as returned by `GET /servers/detail`
#[derive(Debug, Clone, Deserialize)]
pub struct NovaServer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// `{"id": ..}` or, with newer microversions, `{"original_name": ..}`
    #[serde(default)]
    pub flavor: Value,
    /// `{"id": ..}`, or `""` for volume-backed servers
    #[serde(default)]
    pub image: Value,
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<NovaAddress>>,
    #[serde(rename = "OS-EXT-AZ:availability_zone", default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovaAddress {
    pub addr: String,
    #[serde(default)]
    pub version: u8,
    #[serde(rename = "OS-EXT-IPS:type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Entry of Nova's `servers_links` / `flavors_links`
#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    rel: String,
    href: String,
}

fn next_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|link| link.rel == "next")
        .map(|link| link.href.clone())
}

/// One page of a paginated listing
trait Page: DeserializeOwned {
    type Item;

    /// Items on this page and the link to the next one
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Debug, Deserialize)]
struct ServersPage {
    servers: Vec<NovaServer>,
    #[serde(default)]
    servers_links: Vec<Link>,
}

impl Page for ServersPage {
    type Item = NovaServer;

    fn into_parts(self) -> (Vec<NovaServer>, Option<String>) {
        let next = next_link(&self.servers_links);
        (self.servers, next)
    }
}

#[derive(Debug, Deserialize)]
struct NamedItem {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlavorsPage {
    flavors: Vec<NamedItem>,
    #[serde(default)]
    flavors_links: Vec<Link>,
}

impl Page for FlavorsPage {
    type Item = NamedItem;

    fn into_parts(self) -> (Vec<NamedItem>, Option<String>) {
        let next = next_link(&self.flavors_links);
        (self.flavors, next)
    }
}

/// Glance puts the next page in a top-level `next`, relative to the endpoint
#[derive(Debug, Deserialize)]
struct ImagesPage {
    images: Vec<NamedItem>,
    #[serde(default)]
    next: Option<String>,
}

impl Page for ImagesPage {
    type Item = NamedItem;

    fn into_parts(self) -> (Vec<NamedItem>, Option<String>) {
        (self.images, self.next)
    }
}

/// Resolves a pagination link against a service root
///
/// Absolute links are used as they are.
pub fn resolve_link(root: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            root.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

/// URL of Keystone's token endpoint for an `auth_url`
pub fn token_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{}/auth/tokens", base)
    } else {
        format!("{}/v3/auth/tokens", base)
    }
}

/// Password authentication request body
pub fn auth_request(auth: &AuthConfig) -> Value {
    let user_domain = match (&auth.user_domain_id, &auth.user_domain_name) {
        (Some(id), _) => json!({ "id": id }),
        (None, Some(name)) => json!({ "name": name }),
        (None, None) => json!({ "name": DEFAULT_DOMAIN }),
    };
    let user = match &auth.user_id {
        Some(id) => json!({ "id": id, "password": auth.password }),
        None => json!({
            "name": auth.username,
            "domain": user_domain,
            "password": auth.password,
        }),
    };

    let mut body = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": { "user": user },
            }
        }
    });

    let project_domain = match (&auth.project_domain_id, &auth.project_domain_name) {
        (Some(id), _) => json!({ "id": id }),
        (None, Some(name)) => json!({ "name": name }),
        (None, None) => json!({ "name": DEFAULT_DOMAIN }),
    };
    let scope = match (&auth.project_id, &auth.project_name) {
        (Some(id), _) => Some(json!({ "project": { "id": id } })),
        (None, Some(name)) => Some(json!({ "project": { "name": name, "domain": project_domain } })),
        (None, None) => None,
    };
    if let Some(scope) = scope {
        body["auth"]["scope"] = scope;
    }
    body
}

/// Picks the endpoint URL of a service from the catalog
///
/// An empty `region` matches any region.
pub fn find_endpoint<'a>(
    catalog: &'a [CatalogEntry],
    service_type: &str,
    interface: &str,
    region: &str,
) -> Option<&'a str> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|ep| {
            ep.interface == interface
                && (region.is_empty()
                    || ep.region.as_deref() == Some(region)
                    || ep.region_id.as_deref() == Some(region))
        })
        .map(|ep| ep.url.trim_end_matches('/'))
}

/// An authenticated session against one cloud-region
#[derive(Debug, Clone)]
pub struct OpenStackClient {
    client: Client,
    token: String,
    compute_url: String,
    image_url: Option<String>,
    project: Option<ProjectRef>,
}

impl OpenStackClient {
    /// Authenticates and resolves the compute (and, if present, image) endpoints
    pub async fn authenticate(client: Client, region: &CloudRegion) -> Result<Self, OpenStackError> {
        let auth_url = region
            .auth
            .auth_url
            .as_deref()
            .ok_or(OpenStackError::MissingAuthUrl)?;
        let url = token_url(auth_url);
        tracing::debug!(cloud = %region.cloud, region = %region.region, %url, "authenticating");

        let response = client
            .post(&url)
            .json(&auth_request(&region.auth))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpenStackError::Status { status, url });
        }
        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(OpenStackError::MissingToken)?;
        let text = response.text().await?;
        let body: TokenResponse = serde_json::from_str(&text)?;

        let compute_url = find_endpoint(&body.token.catalog, "compute", &region.interface, &region.region)
            .ok_or_else(|| OpenStackError::NoEndpoint {
                service: "compute".to_string(),
                interface: region.interface.clone(),
                region: region.region.clone(),
            })?
            .to_string();
        let image_url = find_endpoint(&body.token.catalog, "image", &region.interface, &region.region)
            .map(str::to_string);

        Ok(Self {
            client,
            token,
            compute_url,
            image_url,
            project: body.token.project,
        })
    }

    /// Project the session is scoped to
    pub fn project(&self) -> Option<&ProjectRef> {
        self.project.as_ref()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, OpenStackError> {
        tracing::debug!(%url, "openstack request");
        let response = self
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpenStackError::Status { status, url });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Collects every page of a listing, starting at `first`
    async fn get_all<P: Page>(&self, first: String, root: &str) -> Result<Vec<P::Item>, OpenStackError> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                tracing::warn!(%url, "pagination link repeats, stopping");
                break;
            }
            let page: P = self.get_json(url).await?;
            let (page_items, link) = page.into_parts();
            items.extend(page_items);
            next = link.map(|href| resolve_link(root, &href));
        }
        Ok(items)
    }

    /// Lists servers with full details
    pub async fn list_servers(&self) -> Result<Vec<NovaServer>, OpenStackError> {
        self.get_all::<ServersPage>(format!("{}/servers/detail", self.compute_url), &self.compute_url)
            .await
    }

    /// Flavor names keyed by flavor id
    pub async fn flavor_names(&self) -> Result<HashMap<String, String>, OpenStackError> {
        let flavors = self
            .get_all::<FlavorsPage>(format!("{}/flavors/detail", self.compute_url), &self.compute_url)
            .await?;
        Ok(named(flavors))
    }

    /// Image names keyed by image id; empty when the cloud has no image service
    pub async fn image_names(&self) -> Result<HashMap<String, String>, OpenStackError> {
        let Some(base) = &self.image_url else {
            return Ok(HashMap::new());
        };
        let root = base.trim_end_matches("/v2");
        let images = self
            .get_all::<ImagesPage>(format!("{}/v2/images", root), root)
            .await?;
        Ok(named(images))
    }
}

fn named(items: Vec<NamedItem>) -> HashMap<String, String> {
    items
        .into_iter()
        .filter_map(|item| item.name.map(|name| (item.id, name)))
        .collect()
}
