use std::{collections::HashMap, sync::Arc};

use crate::{capability::Capability, domain::CapabilityKey};

/// What the router does with a capability's result before returning it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PostProcess {
    #[default]
    None,
    /// Prepend a one-sentence witty summary generated by the shared LLM.
    WittySummary,
}

#[derive(Clone)]
pub struct RegistryEntry {
    pub capability: Arc<dyn Capability>,
    pub post_process: PostProcess,
}

/// Capability key -> capability, built once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct Registry {
    entries: HashMap<CapabilityKey, RegistryEntry>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, key: CapabilityKey) -> Option<&RegistryEntry> {
        self.entries.get(&key)
    }

    /// Lookup by raw name (used by the `/agent <name>` command).
    pub fn find(&self, name: &str) -> Option<(CapabilityKey, &RegistryEntry)> {
        self.entries.get_key_value(name).map(|(k, e)| (*k, e))
    }

    pub fn contains(&self, key: CapabilityKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Registered keys, sorted for stable output.
    pub fn keys(&self) -> Vec<CapabilityKey> {
        let mut keys: Vec<_> = self.entries.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<CapabilityKey, RegistryEntry>,
}

impl RegistryBuilder {
    pub fn register(self, key: CapabilityKey, capability: Arc<dyn Capability>) -> Self {
        self.register_with(key, capability, PostProcess::None)
    }

    /// Register `capability` under `key`; a later registration for the same key wins.
    pub fn register_with(
        mut self,
        key: CapabilityKey,
        capability: Arc<dyn Capability>,
        post_process: PostProcess,
    ) -> Self {
        if self.entries.contains_key(&key) {
            tracing::warn!(%key, "capability registered twice; keeping the latest");
        }
        self.entries.insert(
            key,
            RegistryEntry {
                capability,
                post_process,
            },
        );
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}
