//! CLI command implementations.
//!
//! Every command returns a process exit code:
//!
//! - 0: Success
//! - 1: Error (store, lookup, invalid request)
//! - 3: Audit found balances that disagree with the journal

pub mod audit;
pub mod init;
pub mod inspect;

use biochar_core::LifecycleError;
use serde::Serialize;

/// Exit codes shared by all commands.
pub mod exit_codes {
    /// Success exit code.
    pub const SUCCESS: u8 = 0;
    /// General error exit code.
    pub const ERROR: u8 = 1;
    /// The audit found discrepancies.
    pub const DISCREPANCY: u8 = 3;
}

/// Error response for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

/// Output an error in the appropriate format.
pub fn output_error(json_output: bool, code: &str, message: &str, exit_code: u8) -> u8 {
    if json_output {
        let error = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        };
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&error).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        eprintln!("Error: {message}");
    }
    exit_code
}

/// Output a lifecycle error, using its class as the error code.
pub fn output_lifecycle_error(json_output: bool, err: &LifecycleError) -> u8 {
    output_error(
        json_output,
        err.error_class().as_str(),
        &err.to_string(),
        exit_codes::ERROR,
    )
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}
