//! Core types for Rotacast

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A publishable item supplied by a content source.
///
/// Identity is `id`, which must stay stable across fetches of the same
/// logical item so that duplicate suppression works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_hint: Option<String>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            media_hint: None,
        }
    }

    pub fn with_media_hint(mut self, hint: impl Into<String>) -> Self {
        self.media_hint = Some(hint.into());
        self
    }
}

/// Opaque destination account identifier (e.g. "account1").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A media resource drawn from the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Catalog identifier (file name for directory catalogs)
    pub id: String,
    /// Resolved file location, when the catalog is backed by a directory
    pub path: Option<PathBuf>,
}

/// Final content handed to a publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub body: String,
    pub media: Option<MediaRef>,
}

/// Acknowledgement returned by a publisher on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Platform-side identifier of the created post, if the platform returns one
    pub external_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_item_deserializes_without_hint() {
        let item: ContentItem =
            serde_json::from_str(r#"{"id": "7", "body": "hello"}"#).unwrap();
        assert_eq!(item, ContentItem::new("7", "hello"));
        assert!(item.media_hint.is_none());
    }

    #[test]
    fn test_account_id_is_transparent() {
        let account = AccountId::new("account1");
        assert_eq!(serde_json::to_string(&account).unwrap(), "\"account1\"");
        assert_eq!(account.to_string(), "account1");
    }
}
