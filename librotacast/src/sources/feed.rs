//! JSON post feeds, over HTTP or from disk
//!
//! Both sources read the same document shape:
//!
//! ```json
//! { "posts": [ { "id": 1, "content": "text", "image": "optional.png" } ] }
//! ```
//!
//! Ids may be numbers or strings; they are normalized to strings.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::sources::{normalize_items, ContentSource};
use crate::types::ContentItem;

#[derive(Debug, Deserialize)]
struct FeedDocument {
    #[serde(default)]
    posts: Vec<FeedPost>,
}

#[derive(Debug, Deserialize)]
struct FeedPost {
    id: serde_json::Value,
    content: String,
    #[serde(default)]
    image: Option<String>,
}

fn id_to_string(id: &serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a feed document into normalized content items
pub fn parse_feed(body: &str) -> std::result::Result<Vec<ContentItem>, TransportError> {
    let document: FeedDocument =
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))?;

    let items = document
        .posts
        .into_iter()
        .filter_map(|post| {
            let id = id_to_string(&post.id)?;
            Some(ContentItem {
                id,
                body: post.content,
                media_hint: post.image.filter(|s| !s.trim().is_empty()),
            })
        })
        .collect();

    Ok(normalize_items(items))
}

/// Feed fetched with an HTTP GET
pub struct FeedSource {
    client: reqwest::Client,
    url: String,
}

impl FeedSource {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ContentSource for FeedSource {
    fn name(&self) -> &str {
        "feed"
    }

    async fn fetch(&self) -> std::result::Result<Vec<ContentItem>, TransportError> {
        debug!(url = %self.url, "Fetching feed");
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_feed(&body)
    }
}

/// Feed read from a local file
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> std::result::Result<Vec<ContentItem>, TransportError> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            TransportError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        parse_feed(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_numeric_and_string_ids() {
        let items = parse_feed(
            r#"{"posts": [
                {"id": 1, "content": "one"},
                {"id": "two", "content": "two", "image": "two.png"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], ContentItem::new("1", "one"));
        assert_eq!(items[1].id, "two");
        assert_eq!(items[1].media_hint.as_deref(), Some("two.png"));
    }

    #[test]
    fn test_parse_drops_duplicates_and_bad_ids() {
        let items = parse_feed(
            r#"{"posts": [
                {"id": 3, "content": "a"},
                {"id": 3, "content": "b"},
                {"id": null, "content": "c"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(items, vec![ContentItem::new("3", "a")]);
    }

    #[test]
    fn test_parse_empty_feed_is_ok() {
        assert!(parse_feed(r#"{"posts": []}"#).unwrap().is_empty());
        assert!(parse_feed(r#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_is_decode_error() {
        assert!(matches!(
            parse_feed("<html>rate limited</html>"),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn test_blank_image_is_no_hint() {
        let items = parse_feed(r#"{"posts": [{"id": 1, "content": "x", "image": " "}]}"#).unwrap();
        assert!(items[0].media_hint.is_none());
    }

    #[tokio::test]
    async fn test_file_source_reads_feed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("post.json");
        std::fs::write(&path, r#"{"posts": [{"id": 9, "content": "nine"}]}"#).unwrap();

        let items = FileSource::new(&path).fetch().await.unwrap();
        assert_eq!(items, vec![ContentItem::new("9", "nine")]);
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileSource::new(temp_dir.path().join("absent.json")).fetch().await;
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }

    #[test]
    fn test_feed_source_keeps_url() {
        let source = FeedSource::new(
            "https://example.org/post.json".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(source.url(), "https://example.org/post.json");
        assert_eq!(source.name(), "feed");
    }
}
