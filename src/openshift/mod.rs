//! OpenShift gears inventory
//!
//! Generates jeti inventory from OpenShift gears using the broker REST API,
//! so playbooks written for regular hosts can configure gears.

pub mod client;
pub mod config;

pub use client::{build_inventory, Application, OpenShiftClient, OpenShiftError, SshTarget};
pub use config::{ConfigError, ExpressConf, OpenShiftSettings};
