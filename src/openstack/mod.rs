//! OpenStack inventory
//!
//! Lists servers from every configured cloud-region (or a single cloud),
//! groups them by cloud, region, availability zone and metadata, and caches
//! the rendered inventory.

pub mod client;
pub mod config;
pub mod groups;
pub mod server;

use futures::future::join_all;
use reqwest::Client;
use serde_json::{Map, Value};

pub use client::{OpenStackClient, OpenStackError};
pub use config::{CloudRegion, ConfigError, InventorySettings, OpenStackConfig};
pub use groups::{build_inventory, get_groups_from_server};
pub use server::{normalize, ServerContext, ServerVars};

use crate::cache::CacheManager;
use crate::inventory::Inventory;

/// Lists and normalizes the servers of one cloud-region
pub async fn list_region(
    client: Client,
    region: &CloudRegion,
    settings: &InventorySettings,
    private: bool,
) -> Result<Vec<Value>, OpenStackError> {
    let session = OpenStackClient::authenticate(client, region).await?;
    let servers = session.list_servers().await?;

    let mut ctx = ServerContext {
        cloud: region.cloud.clone(),
        region: region.region.clone(),
        project: session.project().cloned().unwrap_or_default(),
        private,
        ..ServerContext::default()
    };
    if settings.expand_hostvars {
        ctx.flavor_names = session.flavor_names().await?;
        ctx.image_names = session.image_names().await?;
    }

    tracing::debug!(cloud = %region.cloud, region = %region.region, count = servers.len(), "servers listed");
    servers
        .into_iter()
        .map(|server| serde_json::to_value(normalize(server, &ctx)).map_err(OpenStackError::from))
        .collect()
}

/// Inventory run over the configured clouds
#[derive(Debug, Clone)]
pub struct OpenStackInventory {
    config: OpenStackConfig,
    cloud: Option<String>,
    private: bool,
    client: Client,
}

impl OpenStackInventory {
    pub fn new(config: OpenStackConfig, cloud: Option<String>, private: bool) -> Self {
        Self {
            config,
            cloud,
            private,
            client: Client::new(),
        }
    }

    /// Cache location and expiration for this run
    pub fn cache(&self) -> Result<CacheManager, ConfigError> {
        self.config.cache_settings(self.cloud.as_deref())
    }

    /// Lists servers from every selected cloud-region concurrently
    ///
    /// With `fail_on_errors` the first failure aborts the run; otherwise
    /// failed clouds are logged and skipped.
    pub async fn list_servers(&self) -> Result<Vec<Value>, OpenStackError> {
        let regions = self.config.cloud_regions(self.cloud.as_deref())?;
        let settings = &self.config.settings;

        let results = join_all(
            regions
                .iter()
                .map(|region| list_region(self.client.clone(), region, settings, self.private)),
        )
        .await;

        let mut servers = Vec::new();
        for (region, result) in regions.iter().zip(results) {
            match result {
                Ok(listed) => servers.extend(listed),
                Err(e) => {
                    let err = OpenStackError::Cloud {
                        cloud: region.cloud.clone(),
                        region: region.region.clone(),
                        source: Box::new(e),
                    };
                    if settings.fail_on_errors {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, "skipping cloud");
                }
            }
        }
        Ok(servers)
    }

    /// Builds the inventory straight from the clouds
    pub async fn fetch_inventory(&self) -> Result<Inventory, OpenStackError> {
        let servers = self.list_servers().await?;
        Ok(build_inventory(servers, self.config.settings.use_hostnames))
    }

    async fn render(&self) -> Result<String, OpenStackError> {
        Ok(self.fetch_inventory().await?.to_json()?)
    }

    /// Rendered inventory, served from the cache while it is fresh
    pub async fn host_groups(&self, refresh: bool) -> Result<String, OpenStackError> {
        let cache = self.cache()?;
        cache.get_or_refresh(refresh, || self.render()).await
    }
}

/// Looks up one host's variables in rendered inventory JSON
pub fn host_vars_from_json(inventory: &str, host: &str) -> Result<Value, OpenStackError> {
    let value: Value = serde_json::from_str(inventory)?;
    Ok(value
        .get("all")
        .and_then(|all| all.get("hostvars"))
        .and_then(|hostvars| hostvars.get(host))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new())))
}
