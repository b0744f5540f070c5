//! `biochar init` - create the lifecycle database.
//!
//! Opening the store applies the schema, so by the time this command runs
//! the database exists; it reports where it lives and how it is journaled.

use biochar_core::LifecycleCoordinator;
use serde::Serialize;

use super::{exit_codes, output_lifecycle_error, print_json};

/// Response for `biochar init`.
#[derive(Debug, Clone, Serialize)]
pub struct InitResponse {
    /// Database path, or `None` for an in-memory store.
    pub path: Option<String>,
    /// `SQLite` journal mode in effect.
    pub journal_mode: String,
}

/// Reports the initialized store.
pub fn run_init(coordinator: &LifecycleCoordinator, json_output: bool) -> u8 {
    let store = coordinator.store();
    let journal_mode = match store.journal_mode() {
        Ok(mode) => mode,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };
    let response = InitResponse {
        path: store.path().map(|path| path.display().to_string()),
        journal_mode,
    };

    if json_output {
        print_json(&response);
    } else {
        println!(
            "Initialized lifecycle store at {}",
            response.path.as_deref().unwrap_or(":memory:")
        );
        println!("  Journal mode: {}", response.journal_mode);
    }
    exit_codes::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_in_memory_succeeds() {
        let coordinator = LifecycleCoordinator::in_memory().unwrap();
        assert_eq!(run_init(&coordinator, true), exit_codes::SUCCESS);
    }
}
