use partsmart_core::client::{FixedNetwork, ProbeSettings, ResolverSettings};
use partsmart_core::environment::DEFAULT_ENVIRONMENT_ID;
use partsmart_core::probe::default_targets;
use partsmart_core::{BackendEnvironment, EnvironmentRegistry, ProbeTarget};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Schema version written to `connectivity.json`
pub const SETTINGS_VERSION: u32 = 1;

/// Connectivity configuration (persisted in `connectivity.json`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Settings schema version for migration support
    #[serde(default = "default_settings_version")]
    pub version: u32,
    /// Replaces the builtin environment list when set
    #[serde(default)]
    pub environments: Option<Vec<BackendEnvironment>>,
    /// Environment used when nothing is persisted (default: "production")
    #[serde(default = "default_environment")]
    pub default_environment: String,
    /// Manual override bypassing the environment registry (off by default)
    #[serde(default)]
    pub fixed_network: Option<FixedNetwork>,
    /// Freshness window for a successful connection check (default: 60)
    #[serde(default = "default_cache_timeout_secs")]
    pub cache_timeout_secs: u64,
    /// Bound on a single HTTP probe (default: 8)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Background monitoring period (default: 30)
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
    /// Replaces the builtin probe target list when set
    #[serde(default)]
    pub probes: Option<Vec<ProbeTarget>>,
    /// Key-value storage file (default: `<config>/partsmart/storage.json`)
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            environments: None,
            default_environment: default_environment(),
            fixed_network: None,
            cache_timeout_secs: default_cache_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            monitor_interval_secs: default_monitor_interval_secs(),
            probes: None,
            storage_path: None,
        }
    }
}

impl AppConfig {
    /// Environment registry described by this config. An unusable custom list
    /// is logged and replaced by the builtin one.
    pub fn registry(&self) -> EnvironmentRegistry {
        match &self.environments {
            Some(environments) => {
                EnvironmentRegistry::new(environments.clone(), &self.default_environment)
                    .unwrap_or_else(|e| {
                        log::error!("Invalid environment list in settings: {}, using builtin", e);
                        EnvironmentRegistry::builtin()
                    })
            }
            None => EnvironmentRegistry::builtin(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        let mut settings = ResolverSettings {
            fixed_network: self.fixed_network.clone(),
            request_timeout: self.request_timeout(),
            ..Default::default()
        };
        if let Some(health) = self.probe_targets().into_iter().find(|t| t.name == "health") {
            settings.health_target = health;
        }
        settings
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            targets: self.probe_targets(),
            cache_timeout: Duration::from_secs(self.cache_timeout_secs),
            request_timeout: self.request_timeout(),
        }
    }

    /// Custom targets when configured. A list without any candidate could never
    /// report a connection, so it is replaced by the builtin list.
    fn probe_targets(&self) -> Vec<ProbeTarget> {
        match &self.probes {
            Some(probes) if probes.iter().any(|t| t.candidate) => probes.clone(),
            Some(probes) if !probes.is_empty() => {
                log::warn!(
                    "No probe target in settings is marked `candidate`, using builtin probes"
                );
                default_targets()
            }
            _ => default_targets(),
        }
    }

    /// Clamp timing values into ranges the prober can run with.
    fn sanitize(&mut self) {
        let clamp = |name: &str, value: &mut u64, min: u64, max: u64| {
            let clamped = (*value).clamp(min, max);
            if clamped != *value {
                log::warn!("{} = {} is out of range, using {}", name, value, clamped);
                *value = clamped;
            }
        };
        clamp("cache_timeout_secs", &mut self.cache_timeout_secs, 5, 3600);
        clamp("request_timeout_secs", &mut self.request_timeout_secs, 1, 60);
        clamp("monitor_interval_secs", &mut self.monitor_interval_secs, 5, 3600);
    }
}

fn default_settings_version() -> u32 {
    0
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT_ID.to_string()
}

fn default_cache_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    8
}

fn default_monitor_interval_secs() -> u64 {
    30
}

/// `<config_dir>/partsmart`
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("partsmart")
}

pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("connectivity.json")
}

pub fn load_settings() -> AppConfig {
    load_settings_from(&get_settings_path())
}

/// Load `connectivity.json`. Never fails: unreadable or invalid content yields defaults.
pub fn load_settings_from(path: &Path) -> AppConfig {
    if !path.exists() {
        log::info!("No connectivity settings at {}, using builtin environments", path.display());
        return AppConfig::default();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Cannot read connectivity settings {}: {}", path.display(), e);
            return AppConfig::default();
        }
    };

    match serde_json::from_str::<AppConfig>(&content) {
        Ok(settings) => return migrate_settings(settings, path),
        Err(e) => {
            log::warn!("Connectivity settings do not match the schema ({}), recovering valid fields", e);
        }
    }

    match recover_settings_from_json(&content) {
        Ok(settings) => {
            log::info!("Recovered connectivity settings from {}", path.display());
            let settings = migrate_settings(settings, path);
            if let Err(e) = save_settings_to(path, &settings) {
                log::warn!("Could not rewrite recovered connectivity settings: {}", e);
            }
            settings
        }
        Err(e) => {
            log::error!(
                "Connectivity settings at {} are unusable ({}), running with defaults and leaving the file untouched",
                path.display(),
                e
            );
            AppConfig::default()
        }
    }
}

/// Field-by-field parse of a file that failed strict deserialization.
fn recover_settings_from_json(content: &str) -> Result<AppConfig> {
    use anyhow::Context;

    let value: serde_json::Value =
        serde_json::from_str(content).context("Settings file is not valid JSON")?;
    let obj = value
        .as_object()
        .context("Settings file root is not a JSON object")?;

    let mut settings = AppConfig::default();

    if let Some(v) = obj.get("version").and_then(|v| v.as_u64()) {
        settings.version = v as u32;
    }

    if let Some(v) = obj.get("environments") {
        match serde_json::from_value::<Option<Vec<BackendEnvironment>>>(v.clone()) {
            Ok(environments) => settings.environments = environments,
            Err(_) => log::warn!("Could not parse environments, using builtin list"),
        }
    }

    if let Some(v) = obj.get("default_environment").and_then(|v| v.as_str()) {
        settings.default_environment = v.to_string();
    }

    if let Some(v) = obj.get("fixed_network") {
        match serde_json::from_value::<Option<FixedNetwork>>(v.clone()) {
            Ok(fixed) => settings.fixed_network = fixed,
            Err(_) => log::warn!("Could not parse fixed_network, ignoring override"),
        }
    }

    if let Some(v) = obj.get("cache_timeout_secs").and_then(|v| v.as_u64()) {
        settings.cache_timeout_secs = v;
    }

    if let Some(v) = obj.get("request_timeout_secs").and_then(|v| v.as_u64()) {
        settings.request_timeout_secs = v;
    }

    if let Some(v) = obj.get("monitor_interval_secs").and_then(|v| v.as_u64()) {
        settings.monitor_interval_secs = v;
    }

    if let Some(v) = obj.get("probes") {
        if let Ok(probes) = serde_json::from_value::<Option<Vec<ProbeTarget>>>(v.clone()) {
            settings.probes = probes;
        }
    }

    if let Some(v) = obj.get("storage_path").and_then(|v| v.as_str()) {
        settings.storage_path = Some(PathBuf::from(v));
    }

    Ok(settings)
}

/// Bring settings up to `SETTINGS_VERSION` and into valid ranges.
fn migrate_settings(mut settings: AppConfig, path: &Path) -> AppConfig {
    settings.sanitize();
    let original_version = settings.version;

    if settings.version < SETTINGS_VERSION {
        // v0 files predate the `version` field; every v1 field has a default
        log::info!(
            "Upgrading connectivity settings from v{} to v{}",
            settings.version,
            SETTINGS_VERSION
        );
        settings.version = SETTINGS_VERSION;
    }

    if original_version != settings.version {
        if let Err(e) = save_settings_to(path, &settings) {
            log::warn!("Could not write upgraded connectivity settings: {}", e);
        }
    }

    settings
}

pub fn save_settings(settings: &AppConfig) -> Result<()> {
    save_settings_to(&get_settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
