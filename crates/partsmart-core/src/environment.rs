use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Last-known-good backend. Used when nothing else can be resolved.
pub const FALLBACK_BASE_URL: &str = "https://api.partsmart.app/api";

/// Id of the environment selected when nothing is persisted.
pub const DEFAULT_ENVIRONMENT_ID: &str = "production";

/// One selectable backend deployment.
///
/// Ids are referenced by the persisted selection, so an id must never change
/// once it has shipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEnvironment {
    /// Short stable identifier, unique within a registry
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Prefix for every API call, e.g. `https://host/api`
    pub base_url: String,
    /// Developer machine on the local network
    #[serde(default)]
    pub is_local: bool,
    /// Public production deployment
    #[serde(default)]
    pub is_production: bool,
}

impl BackendEnvironment {
    pub fn new(id: &str, name: &str, base_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            base_url: base_url.to_string(),
            is_local: false,
            is_production: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    pub fn production(mut self) -> Self {
        self.is_production = true;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("environment registry must contain at least one entry")]
    Empty,
    #[error("duplicate environment id `{0}`")]
    DuplicateId(String),
}

/// Closed, ordered set of known backends plus the default selection.
#[derive(Clone, Debug)]
pub struct EnvironmentRegistry {
    environments: Vec<BackendEnvironment>,
    default_id: String,
}

impl EnvironmentRegistry {
    pub fn new(
        environments: Vec<BackendEnvironment>,
        default_id: &str,
    ) -> Result<Self, RegistryError> {
        if environments.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for env in &environments {
            if !seen.insert(env.id.as_str()) {
                return Err(RegistryError::DuplicateId(env.id.clone()));
            }
        }
        if !environments.iter().any(|e| e.id == default_id) {
            log::warn!(
                "Default environment `{}` is not registered, first entry will be used",
                default_id
            );
        }
        Ok(Self {
            environments,
            default_id: default_id.to_string(),
        })
    }

    /// The list shipped with the app.
    pub fn builtin() -> Self {
        Self {
            environments: builtin_environments(),
            default_id: DEFAULT_ENVIRONMENT_ID.to_string(),
        }
    }

    /// All entries in declaration order. Never empty.
    pub fn list_environments(&self) -> &[BackendEnvironment] {
        &self.environments
    }

    pub fn get_by_id(&self, id: &str) -> Option<&BackendEnvironment> {
        self.environments.iter().find(|e| e.id == id)
    }

    /// The configured default, or the first entry if the default id is missing.
    pub fn get_default(&self) -> &BackendEnvironment {
        self.get_by_id(&self.default_id)
            .unwrap_or(&self.environments[0])
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_environments() -> Vec<BackendEnvironment> {
    vec![
        BackendEnvironment::new("local", "Local", "http://10.0.2.2:5000/api")
            .with_description("Backend running on the developer machine (emulator loopback)")
            .local(),
        BackendEnvironment::new("development", "Development", "https://dev-api.partsmart.app/api")
            .with_description("Shared staging deployment"),
        BackendEnvironment::new("production", "Production", FALLBACK_BASE_URL)
            .with_description("Public marketplace")
            .production(),
    ]
}
