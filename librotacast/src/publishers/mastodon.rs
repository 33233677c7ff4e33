//! Mastodon publisher
//!
//! Posts through the megalodon client, one authenticated client per rotating
//! account. Works against any server speaking the Mastodon API (Pleroma,
//! GoToSocial, Akkoma, ...).

use async_trait::async_trait;
use megalodon::megalodon::PostStatusInputOptions;
use megalodon::{Megalodon, SNS};
use std::collections::HashMap;
use tracing::debug;

use crate::config::{expand_path, AccountConfig};
use crate::error::{ConfigError, PublishError, Result};
use crate::publishers::Publisher;
use crate::types::{AccountId, MediaRef, Payload, PublishReceipt};

/// Default status length limit on stock Mastodon
pub const DEFAULT_CHARACTER_LIMIT: usize = 500;

struct MastodonAccount {
    client: Box<dyn Megalodon + Send + Sync>,
    instance_url: String,
}

pub struct MastodonPublisher {
    accounts: HashMap<AccountId, MastodonAccount>,
    character_limit: usize,
}

impl MastodonPublisher {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            character_limit: DEFAULT_CHARACTER_LIMIT,
        }
    }

    /// Register credentials for one account
    pub fn add_account(
        &mut self,
        account: AccountId,
        instance_url: &str,
        access_token: String,
    ) -> std::result::Result<(), PublishError> {
        let instance_url = normalize_instance_url(instance_url);
        let client = megalodon::generator(SNS::Mastodon, instance_url.clone(), Some(access_token), None)
            .map_err(|e| {
                PublishError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
            })?;

        self.accounts.insert(
            account,
            MastodonAccount {
                client,
                instance_url,
            },
        );
        Ok(())
    }

    /// Build a publisher from configured accounts, reading each token file
    pub fn from_accounts(accounts: &[AccountConfig]) -> Result<Self> {
        let mut publisher = Self::new();

        for account in accounts {
            let instance = account.instance.as_deref().ok_or_else(|| {
                ConfigError::MissingField(format!("accounts.{}.instance", account.name))
            })?;
            let token_file = account.token_file.as_deref().ok_or_else(|| {
                ConfigError::MissingField(format!("accounts.{}.token_file", account.name))
            })?;

            let token = read_token(token_file)?;
            publisher.add_account(AccountId::new(account.name.clone()), instance, token)?;
        }

        Ok(publisher)
    }

    pub fn with_character_limit(mut self, limit: usize) -> Self {
        self.character_limit = limit;
        self
    }

    pub fn validate_content(&self, content: &str) -> std::result::Result<(), PublishError> {
        if content.trim().is_empty() {
            return Err(PublishError::Validation("Content cannot be empty".to_string()));
        }

        let char_count = content.chars().count();
        if char_count > self.character_limit {
            return Err(PublishError::Validation(format!(
                "Content exceeds Mastodon's {} character limit (current: {} characters)",
                self.character_limit, char_count
            )));
        }

        Ok(())
    }

    async fn upload(
        &self,
        account: &MastodonAccount,
        media: &MediaRef,
    ) -> std::result::Result<String, PublishError> {
        let path = media.path.as_ref().ok_or_else(|| {
            PublishError::Validation(format!("Media '{}' has no file to upload", media.id))
        })?;

        let response = account
            .client
            .upload_media(path.display().to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(e, "upload media"))?;

        let media_id = match response.json {
            megalodon::entities::UploadMedia::Attachment(attachment) => attachment.id,
            megalodon::entities::UploadMedia::AsyncAttachment(attachment) => attachment.id,
        };
        debug!(media = %media.id, media_id = %media_id, "Uploaded media");
        Ok(media_id)
    }
}

impl Default for MastodonPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn publish(
        &self,
        account: &AccountId,
        payload: &Payload,
    ) -> std::result::Result<PublishReceipt, PublishError> {
        let target = self
            .accounts
            .get(account)
            .ok_or_else(|| PublishError::UnknownAccount(account.to_string()))?;

        self.validate_content(&payload.body)?;

        let options = match &payload.media {
            Some(media) => {
                let media_id = self.upload(target, media).await?;
                Some(PostStatusInputOptions {
                    media_ids: Some(vec![media_id]),
                    ..Default::default()
                })
            }
            None => None,
        };

        debug!(account = %account, instance = %target.instance_url, "Posting status");
        let response = target
            .client
            .post_status(payload.body.clone(), options.as_ref())
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let post_id = match response.json {
            megalodon::megalodon::PostStatusOutput::Status(status) => status.id,
            megalodon::megalodon::PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(PublishReceipt {
            external_id: Some(post_id),
        })
    }
}

fn read_token(token_file: &str) -> std::result::Result<String, PublishError> {
    let path = expand_path(token_file);
    let token = std::fs::read_to_string(&path)
        .map_err(|e| {
            PublishError::Authentication(format!(
                "Failed to read token file {}: {}",
                path.display(),
                e
            ))
        })?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(PublishError::Authentication(format!(
            "Token file {} is empty",
            path.display()
        )));
    }
    Ok(token)
}

fn normalize_instance_url(instance: &str) -> String {
    let trimmed = instance.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Map megalodon errors onto publish failures
///
/// - HTTP 401/403 → `Authentication`
/// - HTTP 422 → `Validation`
/// - HTTP 429 → `RateLimit`
/// - anything else → `Network`
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PublishError {
    let message = error.to_string();
    let lower = message.to_lowercase();

    match extract_http_status(&message) {
        Some(401) | Some(403) => PublishError::Authentication(format!(
            "Mastodon rejected credentials ({}): {}",
            context, message
        )),
        Some(422) => PublishError::Validation(format!(
            "Mastodon refused content ({}): {}",
            context, message
        )),
        Some(429) => PublishError::RateLimit(format!("Mastodon ({}): {}", context, message)),
        Some(_) => PublishError::Network(format!("Mastodon HTTP error ({}): {}", context, message)),
        None if lower.contains("unauthorized") || lower.contains("forbidden") => {
            PublishError::Authentication(format!("Mastodon ({}): {}", context, message))
        }
        None if lower.contains("too many requests") || lower.contains("rate limit") => {
            PublishError::RateLimit(format!("Mastodon ({}): {}", context, message))
        }
        None if lower.contains("parse") || lower.contains("json") => {
            PublishError::Posting(format!("Mastodon response unreadable ({}): {}", context, message))
        }
        None => PublishError::Network(format!("Mastodon error ({}): {}", context, message)),
    }
}

/// Find an HTTP status code in an error message ("HTTP 401", "status 429", "422: ...")
fn extract_http_status(message: &str) -> Option<u16> {
    for prefix in ["HTTP ", "status ", "code: ", "status_code: "] {
        if let Some(pos) = message.find(prefix) {
            let code = message[pos + prefix.len()..]
                .get(0..3)
                .and_then(|s| s.parse::<u16>().ok())
                .filter(|c| (100..=599).contains(c));
            if code.is_some() {
                return code;
            }
        }
    }

    let bytes = message.as_bytes();
    bytes.windows(4).enumerate().find_map(|(i, w)| {
        let standalone = i == 0 || !bytes[i - 1].is_ascii_digit();
        let shaped = w[..3].iter().all(u8::is_ascii_digit) && (w[3] == b':' || w[3] == b' ');
        if !(standalone && shaped) {
            return None;
        }
        std::str::from_utf8(&w[..3])
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|c| (100..=599).contains(c))
    })
}
