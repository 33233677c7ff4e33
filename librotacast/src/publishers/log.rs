//! Dry-run publisher

use async_trait::async_trait;
use tracing::info;

use crate::error::PublishError;
use crate::publishers::Publisher;
use crate::types::{AccountId, Payload, PublishReceipt};

/// Logs the payload instead of posting it anywhere
#[derive(Debug, Default)]
pub struct LogPublisher;

impl LogPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(
        &self,
        account: &AccountId,
        payload: &Payload,
    ) -> Result<PublishReceipt, PublishError> {
        if payload.body.trim().is_empty() {
            return Err(PublishError::Validation("Content cannot be empty".to_string()));
        }

        let external_id = uuid::Uuid::new_v4().to_string();
        info!(
            account = %account,
            media = ?payload.media.as_ref().map(|m| m.id.as_str()),
            external_id = %external_id,
            "Dry run publish:\n{}",
            payload.body
        );

        Ok(PublishReceipt {
            external_id: Some(external_id),
        })
    }
}
