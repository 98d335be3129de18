//! Registry configuration.

/// What to do when the registry roots cannot be created at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootInitPolicy {
    /// Initialization failure is fatal; the service refuses requests.
    #[default]
    Strict,
    /// Log the failure and keep serving. Reads against the missing root
    /// report "absent", operational writes fail at commit and are only
    /// reported.
    Lenient,
}

/// Configuration for opening a registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Whether every commit is synced to durable media before it is
    /// acknowledged. When false, commits are only flushed.
    pub sync_on_commit: bool,

    /// How many commit outcomes the outcome feed keeps for polling.
    pub outcome_history: usize,

    /// Policy for a failed root initialization.
    pub root_init: RootInitPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            outcome_history: 1024,
            root_init: RootInitPolicy::Strict,
        }
    }
}

impl RegistryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the outcome history size.
    #[must_use]
    pub const fn outcome_history(mut self, size: usize) -> Self {
        self.outcome_history = size;
        self
    }

    /// Sets the root initialization policy.
    #[must_use]
    pub const fn root_init(mut self, policy: RootInitPolicy) -> Self {
        self.root_init = policy;
        self
    }
}
