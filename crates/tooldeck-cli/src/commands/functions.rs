//! `tooldeck functions` — Inspect the function catalog.

use serde_json::Value;
use tooldeck_core::AppState;

use super::print_json;

pub fn list(state: &AppState) -> Result<(), String> {
    let functions = state.registry.describe_all();
    if functions.is_empty() {
        println!("No functions registered.");
        return Ok(());
    }

    println!("{:<20} {:<40} PARAMETERS", "NAME", "DESCRIPTION");
    for f in &functions {
        let params: Vec<String> = f["parameters"]
            .as_object()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        println!(
            "{:<20} {:<40} {}",
            f["name"].as_str().unwrap_or_default(),
            truncate(f["description"].as_str().unwrap_or_default(), 40),
            params.join(", ")
        );
    }
    Ok(())
}

pub fn describe(state: &AppState, name: &str) -> Result<Value, String> {
    state
        .registry
        .describe(name)
        .ok_or_else(|| format!("Function '{}' is not registered", name))
}

pub fn run_describe(state: &AppState, name: &str) -> Result<(), String> {
    print_json(&describe(state, name)?);
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
