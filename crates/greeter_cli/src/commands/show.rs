//! Show command implementation.

use super::with_service;
use greeter_core::View;
use greeter_service::{ServiceConfig, ServiceResult};
use std::path::Path;

/// Runs the show command.
pub fn run(
    path: &Path,
    config: ServiceConfig,
    name: &str,
    view: Option<View>,
) -> Result<(), Box<dyn std::error::Error>> {
    let views: Vec<View> = match view {
        Some(view) => vec![view],
        None => View::ALL.to_vec(),
    };

    let found = with_service(path, config, |service| {
        views
            .iter()
            .map(|view| -> ServiceResult<(View, Option<String>)> {
                let greeting = match view {
                    View::Configuration => service.configured_greeting(name)?,
                    View::Operational => service.served_greeting(name)?,
                };
                Ok((*view, greeting))
            })
            .collect::<ServiceResult<Vec<_>>>()
    })?;

    for (view, greeting) in found {
        match greeting {
            Some(greeting) => println!("{:<14} {}", view.as_str(), greeting),
            None => println!("{:<14} (none)", view.as_str()),
        }
    }
    Ok(())
}
