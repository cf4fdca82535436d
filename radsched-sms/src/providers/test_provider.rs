use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::{ErrorCode, ProviderResult, ProviderStatus, SmsProvider};

/// Records every call and returns a scripted sequence of results. Used by
/// `radsched-sms` and `radsched-engine` integration tests to drive
/// failover/retry paths deterministically without a network.
pub struct TestProvider {
    name: String,
    script: Mutex<Vec<ProviderResult>>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl TestProvider {
    pub fn new(name: impl Into<String>, script: Vec<ProviderResult>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_sends(name: impl Into<String>) -> Self {
        Self::new(name, vec![])
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SmsProvider for TestProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, to: &str, body: &str, from: &str) -> ProviderResult {
        self.calls
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string(), from.to_string()));

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            ProviderResult::sent()
        } else {
            script.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plays_back_a_scripted_sequence_then_defaults_to_sent() {
        let provider = TestProvider::new(
            "fake",
            vec![ProviderResult::failure(
                ProviderStatus::TransientFail,
                ErrorCode::NetworkError,
                "timeout",
            )],
        );
        let first = provider.send("+1a", "hi", "+1b").await;
        assert_eq!(first.status, ProviderStatus::TransientFail);
        let second = provider.send("+1a", "hi", "+1b").await;
        assert_eq!(second.status, ProviderStatus::Sent);
        assert_eq!(provider.call_count(), 2);
    }
}
