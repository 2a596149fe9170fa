//! Provider registry

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::ProviderError;
use crate::provider::{Provider, ProviderStatus};
use crate::Result;

/// Providers ordered by descending priority.
///
/// Equal priorities keep registration order. Availability is probed on every
/// query since it changes at runtime.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<()> {
        let mut providers = self.providers.write();

        if providers.iter().any(|p| p.name() == provider.name()) {
            return Err(ProviderError::AlreadyRegistered(
                provider.name().to_string(),
            ));
        }

        let priority = provider.priority();
        let index = providers
            .iter()
            .position(|p| p.priority() < priority)
            .unwrap_or(providers.len());

        tracing::debug!(
            provider = %provider.name(),
            priority,
            position = index,
            "Registered provider"
        );
        providers.insert(index, provider);

        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    /// All registered providers in priority order
    pub fn all(&self) -> Vec<Arc<dyn Provider>> {
        self.providers.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Providers passing their runtime probe, in priority order
    pub fn get_available(&self) -> Vec<Arc<dyn Provider>> {
        // Probes may spawn processes; don't hold the lock while they run
        self.all().into_iter().filter(|p| p.available()).collect()
    }

    pub fn get_best(&self) -> Result<Arc<dyn Provider>> {
        self.get_available()
            .into_iter()
            .next()
            .ok_or(ProviderError::NoProvidersAvailable)
    }

    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.all()
            .iter()
            .map(|p| ProviderStatus::of(p.as_ref()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}
