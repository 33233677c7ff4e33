//! Publisher abstraction and implementations
//!
//! A publisher performs the single outbound call of a cycle: it takes the
//! active account and the composed payload and either creates the post or
//! reports why it could not.
//!
//! # Examples
//!
//! ```no_run
//! use librotacast::publishers::{log::LogPublisher, Publisher};
//! use librotacast::types::{AccountId, Payload};
//!
//! # async fn example() -> Result<(), librotacast::error::PublishError> {
//! let publisher = LogPublisher::new();
//! let payload = Payload {
//!     body: "Hello from the rotation".to_string(),
//!     media: None,
//! };
//! let receipt = publisher.publish(&AccountId::new("account1"), &payload).await?;
//! println!("Created {:?}", receipt.external_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::config::{Config, PublisherKind};
use crate::error::{PublishError, Result};
use crate::types::{AccountId, Payload, PublishReceipt};

pub mod log;
pub mod mastodon;

// Mock publisher is available for all builds (not just tests) to support integration tests
pub mod mock;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase identifier used in logs (e.g. "mastodon")
    fn name(&self) -> &str;

    /// Publish `payload` as `account`.
    ///
    /// # Errors
    ///
    /// - `PublishError::UnknownAccount` if no credentials exist for `account`
    /// - `PublishError::Authentication` for rejected credentials
    /// - `PublishError::Validation` if the platform refuses the content
    /// - `PublishError::RateLimit` / `PublishError::Network` for platform-side trouble
    async fn publish(
        &self,
        account: &AccountId,
        payload: &Payload,
    ) -> std::result::Result<PublishReceipt, PublishError>;
}

/// Build the publisher described by configuration
pub fn create_publisher(config: &Config) -> Result<Box<dyn Publisher>> {
    let publisher: Box<dyn Publisher> = match config.publish.kind {
        PublisherKind::Log => Box::new(log::LogPublisher::new()),
        PublisherKind::Mastodon => {
            Box::new(mastodon::MastodonPublisher::from_accounts(&config.accounts)?)
        }
    };
    Ok(publisher)
}
