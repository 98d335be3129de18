//! List command implementation.

use super::with_service;
use greeter_core::{RegistryEntry, View};
use greeter_service::ServiceConfig;
use serde::Serialize;
use std::path::Path;

/// Entries of one view.
#[derive(Debug, Serialize)]
pub struct ListResult {
    /// The listed view.
    pub view: View,
    /// Its entries, sorted by name.
    pub entries: Vec<RegistryEntry>,
}

/// Runs the list command.
pub fn run(
    path: &Path,
    config: ServiceConfig,
    view: View,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = with_service(path, config, |service| service.list(view))?;
    let result = ListResult { view, entries };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result),
        other => return Err(format!("Unknown format '{other}', expected text or json").into()),
    }
    Ok(())
}

fn print_text(result: &ListResult) {
    println!("{} view: {} entries", result.view, result.entries.len());
    for entry in &result.entries {
        println!("  {} => {}", entry.name(), entry.greeting());
    }
}
