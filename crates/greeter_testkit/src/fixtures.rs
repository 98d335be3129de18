//! Registry fixtures.
//!
//! A [`TestRegistry`] is a rooted store with an administrator pipeline and
//! a resolver pipeline sharing one outcome feed.

use greeter_core::{
    CommitFeed, CoreResult, GreetingResolver, LoggingChainListener, RegistryAdmin,
    RegistryConfig, RegistryStore, TransactionPipeline, View, WriterRole,
};
use greeter_storage::{FileBackend, StorageBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Commit timeout used by fixture admins.
pub const TEST_COMMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A registry wired for tests.
pub struct TestRegistry {
    /// The store.
    pub store: Arc<RegistryStore>,
    /// Outcome feed shared by both pipelines.
    pub feed: Arc<CommitFeed>,
    /// Administrative boundary.
    pub admin: RegistryAdmin,
    /// Greeting resolver.
    pub resolver: GreetingResolver,
    _temp_dir: Option<TempDir>,
}

impl TestRegistry {
    /// Creates a rooted in-memory registry.
    pub fn memory() -> Self {
        let store = RegistryStore::in_memory().expect("Failed to open in-memory registry");
        Self::rooted(Arc::new(store), None)
    }

    /// Creates a rooted registry whose commit log lives in a temporary
    /// directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = open_file_store(&temp_dir.path().join("registry.log"));
        Self::rooted(Arc::new(store), Some(temp_dir))
    }

    /// Opens a registry on `backend` without creating roots.
    pub fn unrooted(backend: Box<dyn StorageBackend>) -> Self {
        let store = RegistryStore::open(backend, RegistryConfig::default())
            .expect("Failed to open registry");
        Self::wire(Arc::new(store), None)
    }

    /// Opens and roots a registry on `backend`.
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        let store = RegistryStore::open(backend, RegistryConfig::default())
            .expect("Failed to open registry");
        Self::rooted(Arc::new(store), None)
    }

    fn rooted(store: Arc<RegistryStore>, temp_dir: Option<TempDir>) -> Self {
        store.initialize_root().expect("Failed to create registry roots");
        Self::wire(store, temp_dir)
    }

    fn wire(store: Arc<RegistryStore>, temp_dir: Option<TempDir>) -> Self {
        let feed = Arc::new(CommitFeed::new());
        let admin = RegistryAdmin::new(
            Arc::new(pipeline(&store, WriterRole::Administrator, &feed)),
            TEST_COMMIT_TIMEOUT,
        )
        .expect("Failed to create admin");
        let resolver = GreetingResolver::new(Arc::new(pipeline(&store, WriterRole::Resolver, &feed)))
            .expect("Failed to create resolver");
        Self {
            store,
            feed,
            admin,
            resolver,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the commit log, for file registries.
    pub fn log_path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|d| d.path().join("registry.log"))
    }

    /// Closes this registry and opens its commit log again.
    ///
    /// # Panics
    ///
    /// Panics for in-memory registries.
    pub fn reopen(self) -> Self {
        let path = self.log_path().expect("Only file registries can be reopened");
        let Self {
            store,
            admin,
            resolver,
            _temp_dir,
            ..
        } = self;
        resolver.pipeline().close().expect("Failed to close resolver");
        admin.pipeline().close().expect("Failed to close admin");
        store.close().expect("Failed to close store");
        drop((resolver, admin, store));

        Self::wire(Arc::new(open_file_store(&path)), _temp_dir)
    }

    /// Programs an override and waits for it to commit.
    pub fn program(&self, name: &str, greeting: &str) {
        self.admin
            .program_greeting(name, greeting)
            .expect("Failed to program greeting");
    }

    /// Resolves `name`, panicking on error.
    pub fn resolve(&self, name: &str) -> String {
        self.resolver.resolve(name).expect("Failed to resolve")
    }

    /// Waits for every queued resolver write to settle.
    pub fn settle(&self) {
        self.resolver.pipeline().drain();
    }

    /// The greeting recorded for `name` once queued writes settle.
    pub fn served(&self, name: &str) -> Option<String> {
        self.settle();
        self.admin
            .served_greeting(name)
            .expect("Failed to read operational view")
    }

    /// Reads `name` from `view` on a fresh snapshot.
    pub fn read(&self, view: View, name: &str) -> CoreResult<Option<String>> {
        let read = self.admin.pipeline().new_read_transaction()?;
        Ok(read.read(view, name)?.map(|e| e.greeting().to_string()))
    }
}

fn pipeline(
    store: &Arc<RegistryStore>,
    role: WriterRole,
    feed: &Arc<CommitFeed>,
) -> TransactionPipeline {
    TransactionPipeline::new(
        Arc::clone(store),
        role,
        Arc::new(LoggingChainListener),
        Arc::clone(feed),
    )
    .expect("Failed to start pipeline")
}

fn open_file_store(path: &std::path::Path) -> RegistryStore {
    let backend = FileBackend::open_with_create_dirs(path).expect("Failed to open commit log");
    RegistryStore::open(Box::new(backend), RegistryConfig::default())
        .expect("Failed to open file registry")
}

/// Runs `f` against a fresh in-memory registry.
pub fn with_registry<F, R>(f: F) -> R
where
    F: FnOnce(&TestRegistry) -> R,
{
    let registry = TestRegistry::memory();
    f(&registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_registry_is_rooted() {
        let registry = TestRegistry::memory();
        assert!(registry.store.has_root(View::Configuration));
        assert!(registry.store.has_root(View::Operational));
        assert!(registry.log_path().is_none());
    }

    #[test]
    fn file_registry_reopens() {
        let registry = TestRegistry::file();
        registry.program("a", "Hola a");
        assert_eq!(registry.resolve("b"), "Hello b");
        registry.settle();

        let registry = registry.reopen();
        assert_eq!(registry.read(View::Configuration, "a").unwrap().as_deref(), Some("Hola a"));
        assert_eq!(registry.served("b").as_deref(), Some("Hello b"));
    }

    #[test]
    fn with_registry_runs_closure() {
        let greeting = with_registry(|registry| registry.resolve("Ada"));
        assert_eq!(greeting, "Hello Ada");
    }
}
