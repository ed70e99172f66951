use crate::settings::{AppConfig, load_settings};

use anyhow::{Context, Result};
use partsmart_core::client::{
    ApiClient, ConfigResolver, ConnectivityProber, HttpTransport, ReqwestTransport, ResolveError,
};
use partsmart_core::{BackendEnvironment, FileStore, KeyValueStore, SelectionStore};
use std::future::Future;
use std::sync::{Arc, OnceLock};

static SERVICE: OnceLock<ConnectivityService> = OnceLock::new();

/// Wires the registry, store, resolver, prober and API client together and
/// owns the runtime they run on.
pub struct ConnectivityService {
    runtime: Arc<tokio::runtime::Runtime>,
    config: AppConfig,
    resolver: Arc<ConfigResolver>,
    prober: ConnectivityProber,
    api: ApiClient,
}

impl ConnectivityService {
    /// Production wiring: file-backed storage and the reqwest transport.
    pub fn new(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => Arc::new(FileStore::open(path)),
            None => Arc::new(FileStore::open_default()),
        };
        Self::with_parts(config, store, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("partsmart-net")
            .build()
            .context("failed to create tokio runtime")?;

        let resolver = Arc::new(ConfigResolver::new(
            Arc::new(config.registry()),
            SelectionStore::new(store),
            transport.clone(),
            config.resolver_settings(),
        ));
        let prober = ConnectivityProber::new(
            resolver.clone(),
            transport.clone(),
            config.probe_settings(),
        );
        let api = ApiClient::new(resolver.clone(), transport, config.request_timeout());

        Ok(Self {
            runtime: Arc::new(runtime),
            config,
            resolver,
            prober,
            api,
        })
    }

    /// Install the process-wide instance. Later calls keep the first instance.
    pub fn init(config: AppConfig) -> Result<&'static Self> {
        if let Some(existing) = SERVICE.get() {
            log::debug!("Connectivity service already initialized");
            return Ok(existing);
        }
        let service = Self::new(config)?;
        Ok(SERVICE.get_or_init(|| service))
    }

    pub fn get() -> Result<&'static Self> {
        SERVICE
            .get()
            .context("connectivity service not initialized, call init_app() first")
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<ConfigResolver> {
        &self.resolver
    }

    pub fn prober(&self) -> &ConnectivityProber {
        &self.prober
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn runtime(&self) -> &tokio::runtime::Runtime {
        &self.runtime
    }

    /// Drive a future to completion from synchronous (FFI/UI) code.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Switch environment and drop the connection cache of the old one.
    pub async fn switch_environment(&self, id: &str) -> Result<BackendEnvironment, ResolveError> {
        let env = self.resolver.switch_environment(id).await?;
        self.prober.invalidate_cache();
        Ok(env)
    }

    pub async fn reset_configuration(&self) {
        self.resolver.reset_configuration().await;
        self.prober.invalidate_cache();
    }

    pub fn start_monitoring(&self) {
        let _guard = self.runtime.enter();
        self.prober.start_monitoring(self.config.monitor_interval());
    }

    pub fn stop_monitoring(&self) {
        self.prober.stop_monitoring();
    }
}

/// Initialize logging and the global service from the settings file.
/// Call once at app startup.
pub fn init_app() -> Result<&'static ConnectivityService> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    let config = load_settings();
    let service = ConnectivityService::init(config)?;
    log::info!(
        "Connectivity service ready ({} environments)",
        service.resolver().registry().list_environments().len()
    );
    Ok(service)
}
