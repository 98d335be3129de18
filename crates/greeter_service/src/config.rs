//! Service configuration.

use greeter_core::{RegistryConfig, RootInitPolicy};
use std::time::Duration;

/// Configuration for the hello service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Configuration of the underlying registry.
    pub registry: RegistryConfig,
    /// How long administrative writes wait for their commit.
    pub commit_timeout: Duration,
}

impl ServiceConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            registry: RegistryConfig::default(),
            commit_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the registry configuration.
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the administrative commit timeout.
    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    /// Sets the root initialization policy.
    pub fn with_root_init(mut self, policy: RootInitPolicy) -> Self {
        self.registry = self.registry.root_init(policy);
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.commit_timeout, Duration::from_secs(5));
        assert_eq!(config.registry.root_init, RootInitPolicy::Strict);
    }

    #[test]
    fn config_builder() {
        let config = ServiceConfig::new()
            .with_commit_timeout(Duration::from_millis(250))
            .with_registry(RegistryConfig::new().sync_on_commit(false))
            .with_root_init(RootInitPolicy::Lenient);

        assert_eq!(config.commit_timeout, Duration::from_millis(250));
        assert!(!config.registry.sync_on_commit);
        assert_eq!(config.registry.root_init, RootInitPolicy::Lenient);
    }
}
