//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the tooldeck-core engine through `AppState`.

pub mod config;
pub mod functions;
pub mod server;
pub mod workflow;

use std::sync::Arc;

use tooldeck_core::{AppState, AppStateInner, Database};

/// Initialize a shared `AppState` from the given SQLite database path.
///
/// `:memory:` opens a throwaway in-memory database.
pub fn init_state(db_path: &str) -> Result<AppState, String> {
    let db = if db_path == ":memory:" {
        Database::open_in_memory()
    } else {
        Database::open(db_path)
    }
    .map_err(|e| format!("Failed to open database '{}': {}", db_path, e))?;

    Ok(Arc::new(AppStateInner::new(db)))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
