//! Hello command implementation.

use super::with_service;
use greeter_service::{HelloWorldInput, ServiceConfig};
use std::path::Path;

/// Runs the hello command.
pub fn run(path: &Path, config: ServiceConfig, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let output = with_service(path, config, |service| {
        service.hello_world(HelloWorldInput::new(name))
    })?;
    println!("{}", output.greeting);
    Ok(())
}
