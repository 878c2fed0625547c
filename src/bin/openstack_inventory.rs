//! OpenStack inventory
//!
//! Reads clouds.yaml (or `OS_*` variables), lists servers from every cloud or
//! the one selected with `--cloud`, and prints the grouped inventory. Output is
//! cached per the `cache:` section of the config file.

use std::process::ExitCode;

use clap::Parser;

use jeti_inventory::cli::{InventoryRequest, OpenStackCli};
use jeti_inventory::logging;
use jeti_inventory::openstack::{host_vars_from_json, OpenStackConfig, OpenStackError, OpenStackInventory};

async fn run(cli: &OpenStackCli) -> Result<String, OpenStackError> {
    let config = OpenStackConfig::load()?;
    let inventory = OpenStackInventory::new(config, cli.cloud.clone(), cli.private);
    let groups = inventory.host_groups(cli.refresh).await?;

    match cli.request() {
        InventoryRequest::List => Ok(groups),
        InventoryRequest::Host(host) => Ok(host_vars_from_json(&groups, &host)?.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = OpenStackCli::parse();
    logging::init(cli.debug);

    match run(&cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
