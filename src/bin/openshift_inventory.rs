//! OpenShift gears inventory
//!
//! `openshift-inventory --list` prints every gear grouped by application;
//! `--host <name>` prints an empty object since gears carry no host variables.

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;

use jeti_inventory::cli::{InventoryRequest, OpenShiftCli};
use jeti_inventory::inventory::empty_json;
use jeti_inventory::logging;
use jeti_inventory::openshift::{OpenShiftClient, OpenShiftSettings};

async fn list() -> Result<String, Box<dyn Error>> {
    let settings = OpenShiftSettings::from_env()?;
    let client = OpenShiftClient::new(&settings);
    let inventory = client.fetch_inventory().await?;
    Ok(inventory.to_json()?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = OpenShiftCli::parse();
    logging::init(false);

    let request = match cli.request() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match request {
        InventoryRequest::Host(_) => {
            println!("{}", empty_json());
            ExitCode::SUCCESS
        }
        InventoryRequest::List => match list().await {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}
