//! Command-line interface parsing for the inventory programs
//!
//! Both inventory programs follow jeti's dynamic inventory convention:
//! `--list` prints every group, `--host <name>` prints one host's variables.

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use thiserror::Error;

/// Message printed when neither `--list` nor `--host` is given
pub const NEED_ARGUMENT: &str = "Need an argument, either --list or --host <host>";

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// Neither `--list` nor `--host` was given
    #[error("Need an argument, either --list or --host <host>")]
    MissingAction,
}

/// What the caller asked the inventory program for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRequest {
    /// Print the whole inventory
    List,
    /// Print the variables of one host
    Host(String),
}

impl InventoryRequest {
    /// Resolves the request from the `--list` / `--host` flags
    ///
    /// # Returns
    /// * `Ok(InventoryRequest::Host)` when `--host` was given
    /// * `Ok(InventoryRequest::List)` when `--list` was given
    /// * `Err(CliError::MissingAction)` when neither was given
    pub fn from_flags(list: bool, host: Option<&str>) -> Result<Self, CliError> {
        match (list, host) {
            (_, Some(host)) => Ok(InventoryRequest::Host(host.to_string())),
            (true, None) => Ok(InventoryRequest::List),
            (false, None) => Err(CliError::MissingAction),
        }
    }
}

/// OpenShift gears inventory
#[derive(Parser, Debug)]
#[command(name = "openshift-inventory")]
#[command(about = "Generates jeti inventory of OpenShift gears using the broker REST interface")]
#[command(version)]
pub struct OpenShiftCli {
    /// List all groups and hosts
    #[arg(long, conflicts_with = "host")]
    pub list: bool,

    /// Show variables for a single host (always empty)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,
}

impl OpenShiftCli {
    pub fn request(&self) -> Result<InventoryRequest, CliError> {
        InventoryRequest::from_flags(self.list, self.host.as_deref())
    }
}

/// OpenStack inventory
#[derive(Parser, Debug)]
#[command(name = "openstack-inventory")]
#[command(about = "OpenStack Inventory Module")]
#[command(version)]
pub struct OpenStackCli {
    /// Cloud name (default: all clouds)
    #[arg(long, env = "OS_CLOUD")]
    pub cloud: Option<String>,

    /// Use private address for jeti host
    #[arg(long, env = "OS_PRIVATE", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub private: bool,

    /// Refresh cached information
    #[arg(long, env = "OS_REFRESH", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub refresh: bool,

    /// Enable debug output
    #[arg(long, env = "OS_DEBUG", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// List all groups and hosts (the default)
    #[arg(long, conflicts_with = "host")]
    pub list: bool,

    /// Show variables for a single host
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,
}

impl OpenStackCli {
    /// The OpenStack inventory lists by default
    pub fn request(&self) -> InventoryRequest {
        match &self.host {
            Some(host) => InventoryRequest::Host(host.clone()),
            None => InventoryRequest::List,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_flags() {
        assert_eq!(
            InventoryRequest::from_flags(true, None).unwrap(),
            InventoryRequest::List
        );
        assert_eq!(
            InventoryRequest::from_flags(false, Some("web1")).unwrap(),
            InventoryRequest::Host("web1".to_string())
        );
        assert!(InventoryRequest::from_flags(false, None).is_err());
    }

    #[test]
    fn test_missing_action_message() {
        let err = InventoryRequest::from_flags(false, None).unwrap_err();
        assert_eq!(err.to_string(), NEED_ARGUMENT);
    }

    #[test]
    fn test_openshift_cli_list() {
        let cli = OpenShiftCli::parse_from(["openshift-inventory", "--list"]);
        assert_eq!(cli.request().unwrap(), InventoryRequest::List);
    }

    #[test]
    fn test_openshift_cli_host() {
        let cli = OpenShiftCli::parse_from(["openshift-inventory", "--host", "blog-johndoe.example.org"]);
        assert_eq!(
            cli.request().unwrap(),
            InventoryRequest::Host("blog-johndoe.example.org".to_string())
        );
    }

    #[test]
    fn test_openshift_cli_list_and_host_conflict() {
        let result = OpenShiftCli::try_parse_from(["openshift-inventory", "--list", "--host", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_openshift_cli_no_args() {
        let cli = OpenShiftCli::parse_from(["openshift-inventory"]);
        assert!(cli.request().is_err());
    }

    #[test]
    fn test_openstack_cli_flags() {
        let cli = OpenStackCli::parse_from([
            "openstack-inventory",
            "--cloud",
            "mordred",
            "--private",
            "--refresh",
        ]);
        assert_eq!(cli.cloud.as_deref(), Some("mordred"));
        assert!(cli.private);
        assert!(cli.refresh);
        assert_eq!(cli.request(), InventoryRequest::List);
    }

    #[test]
    fn test_openstack_cli_host() {
        let cli = OpenStackCli::parse_from(["openstack-inventory", "--host", "web1"]);
        assert_eq!(cli.request(), InventoryRequest::Host("web1".to_string()));
    }
}
