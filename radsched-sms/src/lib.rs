pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod sticky;

pub use dispatcher::{Dispatcher, SendOutcome};
pub use error::SmsError;
pub use provider::{ErrorCode, ProviderResult, ProviderStatus, SmsProvider};
pub use providers::twilio::TwilioProvider;
pub use registry::ProviderRegistry;

#[cfg(any(test, feature = "test-provider"))]
pub use providers::test_provider::TestProvider;
