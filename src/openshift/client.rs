//! OpenShift broker REST client
//!
//! Fetches the account's first domain and its applications, then reshapes the
//! applications into inventory groups keyed by application name.

use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::config::OpenShiftSettings;
use crate::inventory::{Group, Inventory};

/// Media type the broker expects, pinned to API version 1.5
const BROKER_ACCEPT: &str = "application/json; version=1.5";

/// Errors that can occur when talking to the broker
#[derive(Debug, Error)]
pub enum OpenShiftError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Broker answered with a non-success status
    #[error("broker returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The account owns no domain
    #[error("no domains found for this account")]
    NoDomain,

    /// An application's ssh_url is not `ssh://user@host`
    #[error("malformed ssh_url: {0}")]
    MalformedSshUrl(String),
}

/// Every broker response wraps its payload in `data`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
pub struct Domain {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub name: Option<String>,
    pub ssh_url: String,
}

/// Login user and host parsed from an application's ssh_url
#[derive(Debug, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
}

impl SshTarget {
    /// Parses `ssh://520311404832ce3e570000ff@blog-johndoe.example.org`
    pub fn parse(ssh_url: &str) -> Result<Self, OpenShiftError> {
        let malformed = || OpenShiftError::MalformedSshUrl(ssh_url.to_string());
        let rest = ssh_url.strip_prefix("ssh://").ok_or_else(malformed)?;
        let (user, host) = rest.split_once('@').ok_or_else(malformed)?;
        let host = host.trim_end_matches('/');
        if user.is_empty() || host.is_empty() || host.contains('@') {
            return Err(malformed());
        }
        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
        })
    }

    /// Group name: the host up to its first `-`
    pub fn app_name(&self) -> &str {
        self.host.split('-').next().unwrap_or(&self.host)
    }
}

/// Builds the inventory from broker applications
///
/// Each application becomes a group holding only its gear host, with the
/// gear's login user as `jet_ssh_user`. When two gears share a group name the
/// later one replaces the earlier.
pub fn build_inventory(apps: &[Application]) -> Result<Inventory, OpenShiftError> {
    let mut inventory = Inventory::new();
    for app in apps {
        let target = SshTarget::parse(&app.ssh_url)?;
        let name = target.app_name().to_string();
        tracing::debug!(
            app = app.name.as_deref().unwrap_or(""),
            host = %target.host,
            group = %name,
            "application"
        );

        let mut vars = Map::new();
        vars.insert("jet_ssh_user".to_string(), Value::String(target.user));
        let group = Group {
            hosts: vec![target.host],
            vars,
        };
        if let Some(previous) = inventory.set_group(&name, group) {
            tracing::warn!(group = %name, replaced = ?previous.hosts, "group name collision, keeping the later gear");
        }
    }
    Ok(inventory)
}

/// Client for the broker REST API
#[derive(Debug, Clone)]
pub struct OpenShiftClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl OpenShiftClient {
    pub fn new(settings: &OpenShiftSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    /// Create a client with a custom HTTP client
    pub fn with_client(client: Client, settings: &OpenShiftSettings) -> Self {
        Self {
            client,
            base_url: settings.broker_url(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, OpenShiftError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(%url, "broker request");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, BROKER_ACCEPT)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OpenShiftError::Status { status, url });
        }

        let text = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        Ok(envelope.data)
    }

    /// Lists the domains of the authenticated account
    pub async fn domains(&self) -> Result<Vec<Domain>, OpenShiftError> {
        self.get_data("domains").await
    }

    /// Lists the applications of a domain
    pub async fn applications(&self, domain_id: &str) -> Result<Vec<Application>, OpenShiftError> {
        self.get_data(&format!("domains/{}/applications", domain_id))
            .await
    }

    /// Fetches the first domain's applications and builds the inventory
    pub async fn fetch_inventory(&self) -> Result<Inventory, OpenShiftError> {
        let domains = self.domains().await?;
        let domain = domains.first().ok_or(OpenShiftError::NoDomain)?;
        let apps = self.applications(&domain.id).await?;
        tracing::debug!(domain = %domain.id, count = apps.len(), "applications fetched");
        build_inventory(&apps)
    }
}
