use crate::service::ConnectivityService;
use partsmart_core::client::ResolveError;
use partsmart_core::{BackendEnvironment, ResolvedConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentTag {
    Local,
    Development,
    Production,
}

impl EnvironmentTag {
    pub fn of(env: &BackendEnvironment) -> Self {
        if env.is_local {
            EnvironmentTag::Local
        } else if env.is_production {
            EnvironmentTag::Production
        } else {
            EnvironmentTag::Development
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EnvironmentTag::Local => "LOCAL",
            EnvironmentTag::Development => "DEV",
            EnvironmentTag::Production => "PROD",
        }
    }
}

/// Flat row for the environment selector.
#[derive(Debug, Clone)]
pub struct EnvironmentOption {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub tag: EnvironmentTag,
    pub is_active: bool,
}

impl EnvironmentOption {
    fn new(env: &BackendEnvironment, active: &ResolvedConfig) -> Self {
        Self {
            id: env.id.clone(),
            name: env.name.clone(),
            description: env.description.clone(),
            base_url: env.base_url.clone(),
            tag: EnvironmentTag::of(env),
            is_active: active.environment_id.as_deref() == Some(env.id.as_str()),
        }
    }
}

/// Registry entries in declaration order, with the active one marked.
pub fn environment_options(service: &ConnectivityService) -> Vec<EnvironmentOption> {
    let active = service.block_on(service.resolver().current());
    service
        .resolver()
        .registry()
        .list_environments()
        .iter()
        .map(|env| EnvironmentOption::new(env, &active))
        .collect()
}

pub fn switch_environment(
    service: &ConnectivityService,
    id: &str,
) -> Result<EnvironmentOption, ResolveError> {
    let env = service.block_on(service.switch_environment(id))?;
    let active = service.block_on(service.resolver().current());
    Ok(EnvironmentOption::new(&env, &active))
}

pub fn current_base_url(service: &ConnectivityService) -> String {
    service.block_on(service.resolver().base_url())
}

pub fn active_config(service: &ConnectivityService) -> ResolvedConfig {
    (*service.block_on(service.resolver().current())).clone()
}

pub fn reset_configuration(service: &ConnectivityService) {
    service.block_on(service.reset_configuration());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{LOCAL, PROD, test_service};

    #[test]
    fn options_mark_default_as_active() {
        let t = test_service();
        let options = environment_options(&t.service);
        let ids: Vec<_> = options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["local", "dev", "prod"]);

        let active: Vec<_> = options.iter().filter(|o| o.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "prod");
        assert_eq!(active[0].tag.label(), "PROD");
        assert_eq!(options[0].tag, EnvironmentTag::Local);
        assert_eq!(options[1].tag, EnvironmentTag::Development);
    }

    #[test]
    fn switching_moves_the_active_mark() {
        let t = test_service();
        let option = switch_environment(&t.service, "local").unwrap();
        assert!(option.is_active);
        assert_eq!(current_base_url(&t.service), LOCAL);

        let options = environment_options(&t.service);
        assert!(options.iter().find(|o| o.id == "local").unwrap().is_active);
        assert!(!options.iter().find(|o| o.id == "prod").unwrap().is_active);
    }

    #[test]
    fn failed_switch_keeps_current_environment() {
        let t = test_service();
        switch_environment(&t.service, "dev").unwrap();
        assert!(switch_environment(&t.service, "nope").is_err());
        assert_eq!(active_config(&t.service).environment_id.as_deref(), Some("dev"));
    }

    #[test]
    fn reset_returns_to_default() {
        let t = test_service();
        switch_environment(&t.service, "local").unwrap();
        reset_configuration(&t.service);
        assert_eq!(current_base_url(&t.service), PROD);
    }
}
