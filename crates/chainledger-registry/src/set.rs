//! Per-chain registry lookup.

use chainledger_core::{chain::ChainId, error::RegistryError};
use std::{collections::HashMap, sync::Arc};

use crate::registry::DecoderRegistry;

/// Frozen registries keyed by chain slug.
#[derive(Debug, Clone, Default)]
pub struct RegistrySet {
    registries: HashMap<String, Arc<DecoderRegistry>>,
}

impl RegistrySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chain: &ChainId, registry: Arc<DecoderRegistry>) {
        self.registries.insert(chain.slug.clone(), registry);
    }

    pub fn with(mut self, chain: &ChainId, registry: Arc<DecoderRegistry>) -> Self {
        self.insert(chain, registry);
        self
    }

    pub fn get(&self, chain: &ChainId) -> Result<Arc<DecoderRegistry>, RegistryError> {
        self.registries
            .get(&chain.slug)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownChain {
                chain: chain.slug.clone(),
            })
    }

    pub fn chains(&self) -> Vec<&str> {
        let mut slugs: Vec<&str> = self.registries.keys().map(String::as_str).collect();
        slugs.sort_unstable();
        slugs
    }
}
