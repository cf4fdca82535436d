pub mod twilio;

#[cfg(any(test, feature = "test-provider"))]
pub mod test_provider;
