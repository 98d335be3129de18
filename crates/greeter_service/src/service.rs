//! The hello service.

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::rpc::{HelloWorldInput, HelloWorldOutput};
use greeter_core::{
    ChainListener, CommitFeed, CoreError, GreetingResolver, LoggingChainListener, RegistryAdmin,
    RegistryDir, RegistryEntry, RegistryStore, RootInitPolicy, SequenceNumber,
    TransactionPipeline, View, WriterRole,
};
use greeter_storage::{FileBackend, InMemoryBackend};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

enum ServiceState {
    Uninitialized,
    Ready(GreetingResolver),
    /// Root initialization failed under the strict policy.
    Failed(String),
    ShutDown,
}

/// Serves `hello-world` and the administrative operations.
///
/// A service starts uninitialized; [`initialize`](Self::initialize) must
/// succeed before requests are answered.
///
/// # Example
///
/// ```
/// use greeter_service::{HelloService, HelloWorldInput, ServiceConfig};
///
/// let service = HelloService::in_memory(ServiceConfig::default()).unwrap();
/// service.initialize().unwrap();
///
/// let output = service.hello_world(HelloWorldInput::new("bla bla bla")).unwrap();
/// assert_eq!(output.greeting, "Hello bla bla bla");
/// ```
pub struct HelloService {
    config: ServiceConfig,
    store: Arc<RegistryStore>,
    feed: Arc<CommitFeed>,
    listener: Arc<dyn ChainListener>,
    admin: RegistryAdmin,
    state: RwLock<ServiceState>,
    /// Held for its lock when the registry lives in a directory.
    _dir: Option<RegistryDir>,
}

impl HelloService {
    /// Creates a service over an open store.
    pub fn new(store: Arc<RegistryStore>, config: ServiceConfig) -> ServiceResult<Self> {
        Self::build(store, config, None)
    }

    /// Creates a service over an empty in-memory registry.
    pub fn in_memory(config: ServiceConfig) -> ServiceResult<Self> {
        let store = RegistryStore::open(Box::new(InMemoryBackend::new()), config.registry.clone())?;
        Self::build(Arc::new(store), config, None)
    }

    /// Opens the registry directory at `path`, creating it if missing, and
    /// recovers its commit log.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::DirectoryLocked`] (as a registry error) if
    /// another process owns the directory.
    pub fn open(path: &Path, config: ServiceConfig) -> ServiceResult<Self> {
        let dir = RegistryDir::open(path, true)?;
        let backend = FileBackend::open(&dir.log_path()).map_err(CoreError::from)?;
        let store = RegistryStore::open(Box::new(backend), config.registry.clone())?;
        info!(path = %path.display(), seq = store.committed_seq().as_u64(), "registry opened");
        Self::build(Arc::new(store), config, Some(dir))
    }

    fn build(
        store: Arc<RegistryStore>,
        config: ServiceConfig,
        dir: Option<RegistryDir>,
    ) -> ServiceResult<Self> {
        let feed = Arc::new(CommitFeed::with_max_history(config.registry.outcome_history));
        let listener: Arc<dyn ChainListener> = Arc::new(LoggingChainListener);
        let admin_pipeline = TransactionPipeline::new(
            Arc::clone(&store),
            WriterRole::Administrator,
            Arc::clone(&listener),
            Arc::clone(&feed),
        )?;
        let admin = RegistryAdmin::new(Arc::new(admin_pipeline), config.commit_timeout)?;

        Ok(Self {
            config,
            store,
            feed,
            listener,
            admin,
            state: RwLock::new(ServiceState::Uninitialized),
            _dir: dir,
        })
    }

    /// Creates the registry roots and starts serving.
    ///
    /// Under [`RootInitPolicy::Strict`] a root failure is returned and the
    /// service answers every request with [`ServiceError::NotReady`]. Under
    /// [`RootInitPolicy::Lenient`] it is logged and the service serves
    /// anyway.
    ///
    /// # Errors
    ///
    /// Calling it more than once is [`CoreError::InvalidOperation`].
    pub fn initialize(&self) -> ServiceResult<()> {
        let mut state = self.state.write();
        if !matches!(*state, ServiceState::Uninitialized) {
            return Err(CoreError::invalid_operation("service already initialized").into());
        }

        if let Err(e) = self.store.initialize_root() {
            match self.config.registry.root_init {
                RootInitPolicy::Strict => {
                    *state = ServiceState::Failed(e.to_string());
                    return Err(e.into());
                }
                RootInitPolicy::Lenient => {
                    warn!(error = %e, "serving without registry roots");
                }
            }
        }

        *state = ServiceState::Ready(self.new_resolver()?);
        info!("hello service ready");
        Ok(())
    }

    fn new_resolver(&self) -> ServiceResult<GreetingResolver> {
        let pipeline = TransactionPipeline::new(
            Arc::clone(&self.store),
            WriterRole::Resolver,
            Arc::clone(&self.listener),
            Arc::clone(&self.feed),
        )?;
        Ok(GreetingResolver::new(Arc::new(pipeline))?)
    }

    fn resolver(&self) -> ServiceResult<GreetingResolver> {
        match &*self.state.read() {
            ServiceState::Ready(resolver) => Ok(resolver.clone()),
            ServiceState::Uninitialized => {
                Err(ServiceError::NotReady("service not initialized".into()))
            }
            ServiceState::Failed(cause) => Err(ServiceError::NotReady(format!(
                "registry initialization failed: {cause}"
            ))),
            ServiceState::ShutDown => Err(ServiceError::NotReady("service shut down".into())),
        }
    }

    /// Returns true once initialized and until shut down.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), ServiceState::Ready(_))
    }

    /// Answers `hello-world`.
    ///
    /// Returns as soon as the greeting is resolved; recording it in the
    /// operational view completes in the background.
    pub fn hello_world(&self, input: HelloWorldInput) -> ServiceResult<HelloWorldOutput> {
        if input.name.is_empty() {
            return Err(ServiceError::InvalidRequest("name must not be empty".into()));
        }
        let greeting = self.resolve_with(self.resolver()?, &input.name)?;
        Ok(HelloWorldOutput { greeting })
    }

    fn resolve_with(&self, resolver: GreetingResolver, name: &str) -> ServiceResult<String> {
        match resolver.resolve(name) {
            // Replaced by `reset_pipeline` after it was handed out.
            Err(CoreError::PipelineClosed) => {
                debug!(name, "resolver pipeline replaced, retrying");
                Ok(self.resolver()?.resolve(name)?)
            }
            result => Ok(result?),
        }
    }

    /// Programs a greeting override, waiting for the commit.
    pub fn program_greeting(&self, name: &str, greeting: &str) -> ServiceResult<SequenceNumber> {
        Ok(self.admin.program_greeting(name, greeting)?)
    }

    /// The greeting last served for `name`.
    pub fn served_greeting(&self, name: &str) -> ServiceResult<Option<String>> {
        Ok(self.admin.served_greeting(name)?)
    }

    /// The override configured for `name`.
    pub fn configured_greeting(&self, name: &str) -> ServiceResult<Option<String>> {
        Ok(self.admin.configured_greeting(name)?)
    }

    /// Every entry of `view`, sorted by name.
    pub fn list(&self, view: View) -> ServiceResult<Vec<RegistryEntry>> {
        Ok(self.admin.list(view)?)
    }

    /// Replaces a broken resolver pipeline with a fresh one.
    ///
    /// Work queued on the old pipeline settles before this returns.
    pub fn reset_pipeline(&self) -> ServiceResult<()> {
        let mut state = self.state.write();
        let ServiceState::Ready(old) = &*state else {
            return Err(ServiceError::NotReady(
                "no resolver pipeline to reset".into(),
            ));
        };
        let was_broken = old.pipeline().is_broken();
        old.pipeline().close()?;

        *state = ServiceState::Ready(self.new_resolver()?);
        info!(was_broken, "resolver pipeline reset");
        Ok(())
    }

    /// Commit outcomes of every pipeline this service owns.
    pub fn outcomes(&self) -> &Arc<CommitFeed> {
        &self.feed
    }

    /// The resolver pipeline, when serving.
    pub fn resolver_pipeline(&self) -> Option<Arc<TransactionPipeline>> {
        match &*self.state.read() {
            ServiceState::Ready(resolver) => Some(Arc::clone(resolver.pipeline())),
            _ => None,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    /// Stops serving, settles queued commits and closes the store.
    pub fn shutdown(&self) -> ServiceResult<()> {
        let previous = std::mem::replace(&mut *self.state.write(), ServiceState::ShutDown);
        if let ServiceState::ShutDown = previous {
            return Ok(());
        }
        if let ServiceState::Ready(resolver) = previous {
            resolver.pipeline().close()?;
        }
        self.admin.pipeline().close()?;
        self.store.close()?;
        info!("hello service shut down");
        Ok(())
    }
}

impl std::fmt::Debug for HelloService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelloService")
            .field("ready", &self.is_ready())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
