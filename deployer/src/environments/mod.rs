//! Environment registry

use std::collections::BTreeMap;

use deploy_api::Environment;

use crate::storage::settings::Settings;

/// Named deployment targets, loaded once and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    environments: BTreeMap<String, Environment>,
}

impl EnvironmentRegistry {
    pub fn new(environments: impl IntoIterator<Item = Environment>) -> Self {
        Self {
            environments: environments
                .into_iter()
                .map(|env| (env.name.clone(), env))
                .collect(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.environment_list())
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    pub fn all(&self) -> Vec<&Environment> {
        self.environments.values().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
