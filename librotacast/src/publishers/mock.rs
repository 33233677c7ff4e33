//! Mock publisher for testing
//!
//! Simulates successes, failures and slow platforms without credentials or
//! network access. State lives behind `Arc<Mutex<_>>` so a clone handed to the
//! pipeline can be inspected afterwards from the test.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PublishError;
use crate::publishers::Publisher;
use crate::types::{AccountId, Payload, PublishReceipt};

/// Configuration for mock publisher behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Error returned from every publish; `None` means success
    pub error: Option<PublishError>,

    /// Delay before completing (simulates network latency)
    pub delay: Duration,

    /// Accounts with credentials; `None` accepts any account
    pub known_accounts: Option<Vec<AccountId>>,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Successful publishes, in order
    pub published: Arc<Mutex<Vec<(AccountId, Payload)>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            error: None,
            delay: Duration::from_millis(0),
            known_accounts: None,
            publish_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A publisher that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// A publisher that always fails with `error`
    pub fn failure(error: PublishError) -> Self {
        Self::new(MockConfig {
            error: Some(error),
            ..Default::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Only accept these accounts; others get `UnknownAccount`
    pub fn with_accounts(accounts: Vec<AccountId>) -> Self {
        Self::new(MockConfig {
            known_accounts: Some(accounts),
            ..Default::default()
        })
    }

    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    /// Everything published successfully so far
    pub fn published(&self) -> Vec<(AccountId, Payload)> {
        self.config.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(
        &self,
        account: &AccountId,
        payload: &Payload,
    ) -> Result<PublishReceipt, PublishError> {
        let call = {
            let mut count = self.config.publish_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(known) = &self.config.known_accounts {
            if !known.contains(account) {
                return Err(PublishError::UnknownAccount(account.to_string()));
            }
        }

        if let Some(error) = &self.config.error {
            return Err(error.clone());
        }

        self.config
            .published
            .lock()
            .unwrap()
            .push((account.clone(), payload.clone()));

        Ok(PublishReceipt {
            external_id: Some(format!("mock-{}", call)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(body: &str) -> Payload {
        Payload {
            body: body.to_string(),
            media: None,
        }
    }

    #[tokio::test]
    async fn test_success_records_payload() {
        let publisher = MockPublisher::success();
        let account = AccountId::new("account1");

        let receipt = publisher.publish(&account, &payload("hi")).await.unwrap();
        assert_eq!(receipt.external_id.as_deref(), Some("mock-1"));
        assert_eq!(publisher.publish_call_count(), 1);
        assert_eq!(publisher.published(), vec![(account, payload("hi"))]);
    }

    #[tokio::test]
    async fn test_failure_records_nothing() {
        let publisher = MockPublisher::failure(PublishError::RateLimit("slow down".to_string()));

        let result = publisher.publish(&AccountId::new("a"), &payload("hi")).await;
        assert!(matches!(result, Err(PublishError::RateLimit(_))));
        assert_eq!(publisher.publish_call_count(), 1);
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let publisher = MockPublisher::success();
        let handle = publisher.clone();

        publisher.publish(&AccountId::new("a"), &payload("x")).await.unwrap();
        assert_eq!(handle.publish_call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let publisher = MockPublisher::with_accounts(vec![AccountId::new("account1")]);

        let result = publisher.publish(&AccountId::new("account2"), &payload("x")).await;
        assert!(matches!(result, Err(PublishError::UnknownAccount(_))));
    }
}
