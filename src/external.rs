//! Example external module
//!
//! jeti runs external modules as child processes: the module arguments arrive
//! as a JSON object on stdin and the module answers with a JSON object on
//! stdout. A non-zero exit marks failure, with `msg` as the error message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors the demo module reports back through `msg`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("failing on request")]
    SimulatedFailure,

    #[error("invalid JSON input: {0}")]
    InvalidInput(String),

    #[error("module arguments must be a JSON object")]
    NotAnObject,

    #[error("missing required integer argument '{0}'")]
    MissingArgument(&'static str),

    #[error("argument '{0}' must be an integer")]
    NotAnInteger(&'static str),

    #[error("integer overflow computing {0}")]
    Overflow(&'static str),
}

/// Arguments accepted by the demo module
#[derive(Debug, Deserialize)]
struct ModuleArgs {
    a: Option<Value>,
    b: Option<Value>,
    #[serde(default)]
    simulate_failure: bool,
}

/// Successful module result
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Arithmetic {
    pub sum: i64,
    pub difference: i64,
}

/// Failure payload
#[derive(Debug, Serialize)]
pub struct Failure {
    pub msg: String,
}

/// Outcome of one module invocation: the JSON line to print and the exit code
#[derive(Debug, PartialEq, Eq)]
pub struct ModuleOutcome {
    pub output: String,
    pub exit_code: u8,
}

fn integer_arg(value: Option<Value>, name: &'static str) -> Result<i64, ModuleError> {
    match value {
        None | Some(Value::Null) => Err(ModuleError::MissingArgument(name)),
        Some(value) => value.as_i64().ok_or(ModuleError::NotAnInteger(name)),
    }
}

/// Computes sum and difference from the raw stdin text
pub fn compute(input: &str) -> Result<Arithmetic, ModuleError> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| ModuleError::InvalidInput(e.to_string()))?;
    if !value.is_object() {
        return Err(ModuleError::NotAnObject);
    }
    let args: ModuleArgs =
        serde_json::from_value(value).map_err(|e| ModuleError::InvalidInput(e.to_string()))?;

    if args.simulate_failure {
        return Err(ModuleError::SimulatedFailure);
    }

    let a = integer_arg(args.a, "a")?;
    let b = integer_arg(args.b, "b")?;

    Ok(Arithmetic {
        sum: a.checked_add(b).ok_or(ModuleError::Overflow("sum"))?,
        difference: a.checked_sub(b).ok_or(ModuleError::Overflow("difference"))?,
    })
}

/// Runs the module against stdin text and renders what should be printed
pub fn run(input: &str) -> ModuleOutcome {
    let rendered = match compute(input) {
        Ok(result) => serde_json::to_string(&result).map(|s| (s, 0)),
        Err(e) => serde_json::to_string(&Failure { msg: e.to_string() }).map(|s| (s, 1)),
    };
    match rendered {
        Ok((output, exit_code)) => ModuleOutcome { output, exit_code },
        Err(e) => ModuleOutcome {
            output: format!("{{\"msg\": \"serialization failed: {}\"}}", e),
            exit_code: 1,
        },
    }
}
