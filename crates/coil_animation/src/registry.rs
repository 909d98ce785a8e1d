//! Named spring-config registry.
//!
//! A small catalog for applications that expose tunable animation presets,
//! e.g. a debug panel listing every named config in use.

use crate::config::SpringConfig;
use crate::error::AnimationError;
use crate::FxIndexMap;

pub const DEFAULT_CONFIG_NAME: &str = "default config";

/// Insertion-ordered map of named spring configs.
#[derive(Clone, Debug, Default)]
pub struct SpringConfigRegistry {
    configs: FxIndexMap<String, SpringConfig>,
}

impl SpringConfigRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the stock config under
    /// [`DEFAULT_CONFIG_NAME`].
    pub fn with_default_entry() -> Self {
        let mut registry = Self::new();
        registry
            .add(DEFAULT_CONFIG_NAME, SpringConfig::default())
            .expect("fresh registry cannot have a name collision");
        registry
    }

    /// Register a config under a name. Names are unique; re-registering an
    /// existing name fails and leaves the registry unchanged.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        config: SpringConfig,
    ) -> Result<(), AnimationError> {
        let name = name.into();
        if self.configs.contains_key(&name) {
            return Err(AnimationError::ConfigNameTaken(name));
        }
        self.configs.insert(name, config);
        Ok(())
    }

    /// Remove a named config, returning it if it was present.
    pub fn remove(&mut self, name: &str) -> Option<SpringConfig> {
        self.configs.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<SpringConfig> {
        self.configs.get(name).copied()
    }

    /// All configs in registration order.
    pub fn all(&self) -> impl Iterator<Item = (&str, SpringConfig)> {
        self.configs.iter().map(|(name, config)| (name.as_str(), *config))
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn clear(&mut self) {
        self.configs.clear();
    }
}
