use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::SmsProvider;

/// Maps a provider name (as stored in [`radsched_core::OrganizationSmsConfig`])
/// to its [`SmsProvider`] implementation. A name with no registered provider
/// is a deployment error the dispatcher surfaces rather than silently drops.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SmsProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn SmsProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SmsProvider>> {
        self.providers.get(name).cloned()
    }
}
