//! Jeti dynamic inventory library
//!
//! Shared pieces behind the `openshift-inventory`, `openstack-inventory` and
//! `demo-external` binaries. Exposed as a library so integration tests can
//! reach the same code the binaries run.

pub mod cache;
pub mod cli;
pub mod external;
pub mod inventory;
pub mod logging;
pub mod openshift;
pub mod openstack;
