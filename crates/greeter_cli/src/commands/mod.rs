//! CLI command implementations.

pub mod hello;
pub mod list;
pub mod program;
pub mod show;

use greeter_service::{HelloService, ServiceConfig, ServiceResult};
use std::path::Path;
use tracing::debug;

/// Opens the registry at `path`, runs `f` on the initialized service and
/// shuts it down, settling any queued commits.
pub fn with_service<F, R>(path: &Path, config: ServiceConfig, f: F) -> ServiceResult<R>
where
    F: FnOnce(&HelloService) -> ServiceResult<R>,
{
    debug!(path = %path.display(), "opening registry");
    let service = HelloService::open(path, config)?;
    service.initialize()?;
    let result = f(&service);
    service.shutdown()?;
    result
}
