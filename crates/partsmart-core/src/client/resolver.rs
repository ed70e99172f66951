use crate::client::prober::probe_target;
use crate::client::transport::HttpTransport;
use crate::environment::{BackendEnvironment, EnvironmentRegistry, FALLBACK_BASE_URL};
use crate::probe::ProbeTarget;
use crate::selection::SelectionStore;
use crate::types::{ResolutionSource, ResolvedConfig};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Manual override pointing every request at a fixed backend, bypassing the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedNetwork {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_true")]
    pub is_local: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug)]
pub struct ResolverSettings {
    pub fixed_network: Option<FixedNetwork>,
    /// Target used by `test_current_environment`
    pub health_target: ProbeTarget,
    pub request_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            fixed_network: None,
            health_target: ProbeTarget::new("health", "/health").candidate(),
            request_timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown environment `{0}`")]
    UnknownEnvironment(String),
    #[error("environment `{id}` has an unusable base URL `{url}`")]
    InvalidBaseUrl { id: String, url: String },
}

#[derive(Default)]
struct ResolverState {
    config: Option<Arc<ResolvedConfig>>,
    /// High-water mark for `last_tested`, survives re-resolution
    last_tested: Option<OffsetDateTime>,
}

impl ResolverState {
    fn install(&mut self, mut config: ResolvedConfig) -> Arc<ResolvedConfig> {
        if let Some(floor) = self.last_tested {
            if config.last_tested.is_none_or(|t| t < floor) {
                config.last_tested = Some(floor);
            }
        }
        self.last_tested = config.last_tested;
        let config = Arc::new(config);
        self.config = Some(config.clone());
        config
    }
}

/// Decides which backend URL outgoing requests use.
///
/// Uninitialized until the first call that needs a URL. Initialization runs
/// under an async lock, so concurrent first callers all observe the result of
/// a single resolution.
pub struct ConfigResolver {
    registry: Arc<EnvironmentRegistry>,
    selection: SelectionStore,
    transport: Arc<dyn HttpTransport>,
    settings: ResolverSettings,
    state: tokio::sync::Mutex<ResolverState>,
}

impl ConfigResolver {
    pub fn new(
        registry: Arc<EnvironmentRegistry>,
        selection: SelectionStore,
        transport: Arc<dyn HttpTransport>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            registry,
            selection,
            transport,
            settings,
            state: tokio::sync::Mutex::new(ResolverState::default()),
        }
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    /// Resolve once. Later calls return the same config until a reset.
    pub async fn initialize(&self) -> Arc<ResolvedConfig> {
        let mut state = self.state.lock().await;
        if let Some(config) = &state.config {
            return config.clone();
        }
        let config = self.resolve();
        log::info!(
            "Resolved backend {} ({}, {:?})",
            config.base_url,
            config.network_name,
            config.source
        );
        state.install(config)
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.config.is_some()
    }

    pub async fn current(&self) -> Arc<ResolvedConfig> {
        self.initialize().await
    }

    pub async fn base_url(&self) -> String {
        self.initialize().await.base_url.clone()
    }

    /// Make `id` the active environment and persist the choice.
    ///
    /// An unknown id leaves the current environment untouched. Reachability is
    /// not checked here.
    pub async fn switch_environment(&self, id: &str) -> Result<BackendEnvironment, ResolveError> {
        let env = self
            .registry
            .get_by_id(id)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownEnvironment(id.to_string()))?;
        validate_base_url(&env)?;

        let mut state = self.state.lock().await;
        self.selection.set_selected_id(&env.id);
        state.install(config_for(&env, ResolutionSource::Persisted));
        if self.settings.fixed_network.is_some() {
            log::warn!(
                "Switched to `{}` while a fixed network override is configured; the override wins on next resolution",
                env.id
            );
        }
        log::info!("Switched backend environment to `{}` ({})", env.id, env.base_url);
        Ok(env)
    }

    /// Probe the health target of the active backend and record the outcome.
    pub async fn test_current_environment(&self) -> bool {
        let config = self.current().await;
        let check = probe_target(
            self.transport.as_ref(),
            &config.base_url,
            &self.settings.health_target,
            self.settings.request_timeout,
        )
        .await;

        let mut state = self.state.lock().await;
        let still_active = state
            .config
            .as_ref()
            .is_some_and(|current| current.base_url == config.base_url);
        if still_active {
            let mut updated = state
                .config
                .as_deref()
                .cloned()
                .unwrap_or_else(|| (*config).clone());
            updated.record_test(OffsetDateTime::now_utc(), check.is_connected);
            let updated = state.install(updated);
            self.selection.save_cached_network(&updated);
        } else {
            log::debug!(
                "Discarding health result for {}, environment changed meanwhile",
                config.base_url
            );
        }

        if let Some(error) = &check.error {
            log::warn!("Backend {} health check failed: {}", config.base_url, error);
        }
        check.is_connected
    }

    /// Forget the current resolution, resolve again and test it.
    pub async fn rescan(&self) -> Arc<ResolvedConfig> {
        self.state.lock().await.config = None;
        self.initialize().await;
        self.test_current_environment().await;
        self.current().await
    }

    pub async fn reset_initialization(&self) {
        self.state.lock().await.config = None;
    }

    /// Drop the persisted selection and cached blobs, then reset.
    pub async fn reset_configuration(&self) {
        self.selection.clear();
        self.reset_initialization().await;
        log::info!("Backend configuration reset to defaults");
    }

    fn resolve(&self) -> ResolvedConfig {
        let mut config = match &self.settings.fixed_network {
            Some(fixed) => ResolvedConfig {
                base_url: fixed.base_url.clone(),
                environment_id: None,
                is_local: fixed.is_local,
                network_name: fixed.name.clone(),
                last_tested: None,
                is_working: false,
                source: ResolutionSource::FixedNetwork,
            },
            None => {
                let selected = self.selection.selected_id();
                resolve_selection(&self.registry, selected.as_deref())
                    .unwrap_or_else(|e| fallback_config(&e))
            }
        };

        if let Some(cached) = self.selection.cached_network() {
            if cached.base_url == config.base_url {
                config.is_working = cached.is_working;
                config.last_tested = cached.last_tested;
            }
        }
        config
    }
}

/// Registry lookup for a persisted selection.
///
/// Unknown or unusable selections fall back to the registry default; an
/// error means the default itself is unusable.
fn resolve_selection(
    registry: &EnvironmentRegistry,
    selected: Option<&str>,
) -> Result<ResolvedConfig, ResolveError> {
    if let Some(id) = selected {
        match registry.get_by_id(id) {
            Some(env) => match validate_base_url(env) {
                Ok(()) => return Ok(config_for(env, ResolutionSource::Persisted)),
                Err(e) => log::warn!("{}, using default environment", e),
            },
            None => log::warn!("Persisted environment `{}` is unknown, using default", id),
        }
    }
    let default = registry.get_default();
    validate_base_url(default)?;
    Ok(config_for(default, ResolutionSource::Default))
}

fn fallback_config(error: &ResolveError) -> ResolvedConfig {
    log::warn!("{}, falling back to {}", error, FALLBACK_BASE_URL);
    ResolvedConfig {
        base_url: FALLBACK_BASE_URL.to_string(),
        environment_id: None,
        is_local: false,
        network_name: "Fallback".to_string(),
        last_tested: None,
        is_working: false,
        source: ResolutionSource::Fallback,
    }
}

fn config_for(env: &BackendEnvironment, source: ResolutionSource) -> ResolvedConfig {
    ResolvedConfig {
        base_url: env.base_url.clone(),
        environment_id: Some(env.id.clone()),
        is_local: env.is_local,
        network_name: env.name.clone(),
        last_tested: None,
        is_working: false,
        source,
    }
}

fn validate_base_url(env: &BackendEnvironment) -> Result<(), ResolveError> {
    let url = env.base_url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(ResolveError::InvalidBaseUrl {
            id: env.id.clone(),
            url: env.base_url.clone(),
        }),
    }
}
