//! Program command implementation.

use super::with_service;
use greeter_service::ServiceConfig;
use std::path::Path;

/// Runs the program command.
pub fn run(
    path: &Path,
    config: ServiceConfig,
    name: &str,
    greeting: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let seq = with_service(path, config, |service| service.program_greeting(name, greeting))?;
    println!("Programmed '{}' for '{}' at {}", greeting, name, seq);
    Ok(())
}
