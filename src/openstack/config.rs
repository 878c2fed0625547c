//! clouds.yaml loading for the OpenStack inventory
//!
//! Settings come from the first config file found in the usual OpenStack
//! locations (plus jeti's own `/etc/jeti/openstack.yaml`), with an extra
//! cloud synthesized from `OS_*` environment variables when present.

use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheManager;

/// jeti-specific config files appended to the OpenStack search path
pub const JETI_CONFIG_FILES: [&str; 2] = ["/etc/jeti/openstack.yaml", "/etc/jeti/openstack.yml"];

/// Name of the cloud built from `OS_*` variables unless `OS_CLOUD_NAME` is set
pub const ENVVARS_CLOUD: &str = "envvars";

/// Errors raised while loading cloud configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid YAML for this layout
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The requested cloud is not configured
    #[error("Cloud {0} was not found.")]
    UnknownCloud(String),

    /// No cloud is configured at all
    #[error("No clouds configured; create a clouds.yaml or set OS_AUTH_URL")]
    NoClouds,

    /// Cache directory could not be determined
    #[error("Unable to determine a cache directory")]
    NoCacheDir,
}

/// Keystone credentials of one cloud
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub password: Option<String>,
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub user_domain_name: Option<String>,
    pub user_domain_id: Option<String>,
    pub project_domain_name: Option<String>,
    pub project_domain_id: Option<String>,
}

/// Entry of a `regions` list: a bare name or a mapping with `name`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RegionEntry {
    Name(String),
    Detailed { name: String },
}

impl RegionEntry {
    fn name(&self) -> &str {
        match self {
            RegionEntry::Name(name) => name,
            RegionEntry::Detailed { name } => name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CloudEntry {
    #[serde(default)]
    auth: AuthConfig,
    region_name: Option<String>,
    #[serde(default)]
    regions: Vec<RegionEntry>,
    interface: Option<String>,
}

/// `cache:` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CacheSection {
    /// Seconds a cached inventory stays fresh
    pub expiration_time: Option<u64>,
    /// Base directory for cache files
    pub path: Option<String>,
}

/// `jeti:` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InventorySettings {
    /// Key hosts by server name instead of server id
    #[serde(default = "default_true")]
    pub use_hostnames: bool,
    /// Make extra API calls to resolve flavor and image names
    #[serde(default = "default_true")]
    pub expand_hostvars: bool,
    /// Fail the whole inventory when one cloud cannot be listed
    #[serde(default = "default_true")]
    pub fail_on_errors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            use_hostnames: true,
            expand_hostvars: true,
            fail_on_errors: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CloudsFile {
    #[serde(default)]
    clouds: serde_yaml::Mapping,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    jeti: InventorySettings,
}

/// One (cloud, region) pair to list servers from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudRegion {
    pub cloud: String,
    /// Empty when the cloud has no region configured
    pub region: String,
    pub auth: AuthConfig,
    /// Endpoint interface to pick from the service catalog
    pub interface: String,
}

/// Loaded OpenStack configuration
#[derive(Debug, Clone, Default)]
pub struct OpenStackConfig {
    /// File the configuration came from, if any
    pub source: Option<PathBuf>,
    clouds: Vec<(String, CloudEntry)>,
    pub cache: CacheSection,
    pub settings: InventorySettings,
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), BaseDirs::new()) {
        (Some(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => PathBuf::from(path),
    }
}

impl OpenStackConfig {
    /// Config file search order
    pub fn config_files<F>(env: &F) -> Vec<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut files = Vec::new();
        if let Some(path) = env("OS_CLIENT_CONFIG_FILE").filter(|p| !p.is_empty()) {
            files.push(PathBuf::from(path));
        }
        let mut dirs = vec![PathBuf::from(".")];
        if let Some(base) = BaseDirs::new() {
            dirs.push(base.home_dir().join(".config").join("openstack"));
        }
        dirs.push(PathBuf::from("/etc/openstack"));
        for dir in dirs {
            files.push(dir.join("clouds.yaml"));
            files.push(dir.join("clouds.yml"));
        }
        files.extend(JETI_CONFIG_FILES.iter().map(PathBuf::from));
        files
    }

    /// Loads configuration from the process environment and default files
    pub fn load() -> Result<Self, ConfigError> {
        let env = |name: &str| std::env::var(name).ok();
        let files = Self::config_files(&env);
        Self::load_from(&files, env)
    }

    /// Loads the first existing file from `files` and adds the env cloud
    pub fn load_from<F>(files: &[PathBuf], env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match files.iter().find(|p| p.is_file()) {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        if let Some((name, entry)) = env_cloud(&env) {
            config.clouds.retain(|(existing, _)| existing != &name);
            config.clouds.push((name, entry));
        }
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), clouds = config.clouds.len(), "loaded cloud config");
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses clouds.yaml text, keeping clouds in file order
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let file: CloudsFile = if text.trim().is_empty() {
            CloudsFile::default()
        } else {
            serde_yaml::from_str(text)?
        };
        let mut clouds = Vec::with_capacity(file.clouds.len());
        for (name, entry) in file.clouds {
            let name: String = serde_yaml::from_value(name)?;
            let entry: CloudEntry = if entry.is_null() {
                CloudEntry::default()
            } else {
                serde_yaml::from_value(entry)?
            };
            clouds.push((name, entry));
        }
        Ok(Self {
            source: None,
            clouds,
            cache: file.cache,
            settings: file.jeti,
        })
    }

    /// Names of all configured clouds, in file order
    pub fn cloud_names(&self) -> Vec<&str> {
        self.clouds.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn expand(name: &str, entry: &CloudEntry) -> Vec<CloudRegion> {
        let interface = entry.interface.clone().unwrap_or_else(|| "public".to_string());
        let mut regions: Vec<String> = entry.regions.iter().map(|r| r.name().to_string()).collect();
        if regions.is_empty() {
            regions.push(entry.region_name.clone().unwrap_or_default());
        }
        regions
            .into_iter()
            .map(|region| CloudRegion {
                cloud: name.to_string(),
                region,
                auth: entry.auth.clone(),
                interface: interface.clone(),
            })
            .collect()
    }

    /// Cloud-regions to list: one cloud when named, otherwise all of them
    pub fn cloud_regions(&self, cloud: Option<&str>) -> Result<Vec<CloudRegion>, ConfigError> {
        match cloud {
            Some(wanted) => self
                .clouds
                .iter()
                .find(|(name, _)| name == wanted)
                .map(|(name, entry)| Self::expand(name, entry))
                .ok_or_else(|| ConfigError::UnknownCloud(wanted.to_string())),
            None => {
                if self.clouds.is_empty() {
                    return Err(ConfigError::NoClouds);
                }
                Ok(self
                    .clouds
                    .iter()
                    .flat_map(|(name, entry)| Self::expand(name, entry))
                    .collect())
            }
        }
    }

    /// Base cache directory before any per-cloud suffix
    pub fn cache_base(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache.path {
            Some(path) => Ok(expand_home(path)),
            None => BaseDirs::new()
                .map(|dirs| dirs.cache_dir().join("openstack"))
                .ok_or(ConfigError::NoCacheDir),
        }
    }

    /// Cache manager for an inventory run
    ///
    /// A named cloud gets its own `<path>_<cloud>` directory; the cloud must
    /// exist. Without a cloud, at least one cloud must be configured.
    pub fn cache_settings(&self, cloud: Option<&str>) -> Result<CacheManager, ConfigError> {
        self.cloud_regions(cloud)?;
        let base = self.cache_base()?;
        let dir = match cloud {
            Some(cloud) => PathBuf::from(format!("{}_{}", base.display(), cloud)),
            None => base,
        };
        Ok(CacheManager::with_dir(dir, self.cache.expiration_time.unwrap_or(0)))
    }
}

/// Cloud described by `OS_*` variables, when `OS_AUTH_URL` is set
fn env_cloud<F>(env: &F) -> Option<(String, CloudEntry)>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| env(name).filter(|v| !v.is_empty());
    let auth_url = get("OS_AUTH_URL")?;
    let auth = AuthConfig {
        auth_url: Some(auth_url),
        username: get("OS_USERNAME"),
        user_id: get("OS_USER_ID"),
        password: get("OS_PASSWORD"),
        project_name: get("OS_PROJECT_NAME").or_else(|| get("OS_TENANT_NAME")),
        project_id: get("OS_PROJECT_ID").or_else(|| get("OS_TENANT_ID")),
        user_domain_name: get("OS_USER_DOMAIN_NAME"),
        user_domain_id: get("OS_USER_DOMAIN_ID"),
        project_domain_name: get("OS_PROJECT_DOMAIN_NAME"),
        project_domain_id: get("OS_PROJECT_DOMAIN_ID"),
    };
    let entry = CloudEntry {
        auth,
        region_name: get("OS_REGION_NAME"),
        regions: Vec::new(),
        interface: get("OS_INTERFACE"),
    };
    let name = get("OS_CLOUD_NAME").unwrap_or_else(|| ENVVARS_CLOUD.to_string());
    Some((name, entry))
}
