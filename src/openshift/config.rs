//! Credentials and broker lookup for the OpenShift inventory
//!
//! Each setting comes from an environment variable first and falls back to
//! the rhc client's `~/.openshift/express.conf`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

pub const USERNAME_ENV: &str = "JETI_OPENSHIFT_USERNAME";
pub const PASSWORD_ENV: &str = "JETI_OPENSHIFT_PASSWORD";
pub const BROKER_ENV: &str = "JETI_OPENSHIFT_BROKER";

/// Errors raised while resolving OpenShift settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither the environment nor express.conf supplied the value
    #[error("failed=True msg='missing {0}'")]
    Missing(&'static str),
}

/// Key/value pairs read from express.conf
///
/// The file has no section headers; `key=value` lines only, with `#` and `;`
/// comments and optional quoting around values.
#[derive(Debug, Default, Clone)]
pub struct ExpressConf {
    values: HashMap<String, String>,
}

impl ExpressConf {
    /// Default location, `~/.openshift/express.conf`
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(".openshift").join("express.conf"))
    }

    /// Loads the file, treating a missing or unreadable file as empty
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "express.conf not read");
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> Self {
        let values = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
            .filter(|line| !line.starts_with('['))
            .filter_map(|line| {
                let (key, value) = line.split_once('=').or_else(|| line.split_once(':'))?;
                Some((key.trim().to_lowercase(), unquote(value.trim()).to_string()))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Resolved credentials and broker host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenShiftSettings {
    pub username: String,
    pub password: String,
    pub broker: String,
}

impl OpenShiftSettings {
    /// Resolves settings from the process environment and the default express.conf
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = ExpressConf::default_path();
        Self::resolve(|name| std::env::var(name).ok(), path.as_deref())
    }

    /// Resolves settings with an explicit environment lookup and config path
    ///
    /// express.conf is only read when some variable is missing from the
    /// environment, and then only once.
    pub fn resolve<F>(env: F, conf_path: Option<&Path>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut conf: Option<ExpressConf> = None;
        let mut get = |env_var: &'static str, conf_key: &str| -> Result<String, ConfigError> {
            if let Some(value) = env(env_var).filter(|v| !v.is_empty()) {
                return Ok(value);
            }
            let conf = conf.get_or_insert_with(|| {
                conf_path.map(ExpressConf::load).unwrap_or_default()
            });
            conf.get(conf_key)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(ConfigError::Missing(env_var))
        };

        Ok(Self {
            username: get(USERNAME_ENV, "default_rhlogin")?,
            password: get(PASSWORD_ENV, "password")?,
            broker: get(BROKER_ENV, "libra_server")?,
        })
    }

    /// REST root of the broker
    ///
    /// A bare host becomes `https://<host>/broker/rest`; a value that already
    /// carries a scheme is used as the origin.
    pub fn broker_url(&self) -> String {
        let broker = self.broker.trim_end_matches('/');
        if broker.starts_with("http://") || broker.starts_with("https://") {
            format!("{}/broker/rest", broker)
        } else {
            format!("https://{}/broker/rest", broker)
        }
    }
}
