//! Example external module: reads `{"a": .., "b": ..}` on stdin and prints
//! `{"sum": .., "difference": ..}`. Failures print `{"msg": ..}` and exit 1.

use std::io;
use std::process::ExitCode;

use jeti_inventory::external::{self, Failure};

fn main() -> ExitCode {
    let input = match io::read_to_string(io::stdin()) {
        Ok(input) => input,
        Err(e) => {
            let failure = Failure {
                msg: format!("failed to read stdin: {}", e),
            };
            println!("{}", serde_json::to_string(&failure).unwrap_or_default());
            return ExitCode::FAILURE;
        }
    };

    let outcome = external::run(&input);
    println!("{}", outcome.output);
    ExitCode::from(outcome.exit_code)
}
