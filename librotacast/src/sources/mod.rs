//! Content sources
//!
//! A source supplies the candidate items for one cycle. Fetch failures are
//! transport errors and get retried by the pipeline; an empty list is a
//! legitimate answer and is not.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::warn;

use crate::config::{expand_path, SourceConfig};
use crate::error::{Result, TransportError};
use crate::types::ContentItem;

pub mod feed;
pub mod market;

// Available for all builds to support integration tests
pub mod mock;

pub use feed::{FeedSource, FileSource};
pub use market::MarketSource;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Fetch the current candidate items
    async fn fetch(&self) -> std::result::Result<Vec<ContentItem>, TransportError>;
}

/// Drop items whose id already appeared earlier in the list.
///
/// The first occurrence wins; later ones are logged and discarded so that
/// one id never maps to two different bodies within a cycle.
pub fn normalize_items(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            if item.id.is_empty() {
                warn!("Dropping item with empty id");
                return false;
            }
            if !seen.insert(item.id.clone()) {
                warn!(content_id = %item.id, "Dropping item with duplicate id");
                return false;
            }
            true
        })
        .collect()
}

/// Build the content source described by configuration.
///
/// `body_limit` caps generated bodies for sources that render their own text.
pub fn create_source(
    config: &SourceConfig,
    body_limit: Option<usize>,
) -> Result<Box<dyn ContentSource>> {
    let source: Box<dyn ContentSource> = match config {
        SourceConfig::Feed { url, timeout } => Box::new(FeedSource::new(url.clone(), *timeout)?),
        SourceConfig::File { path } => Box::new(FileSource::new(expand_path(path))),
        SourceConfig::Market {
            url,
            vs_currency,
            limit,
            timeout,
            ..
        } => Box::new(
            MarketSource::new(url.clone(), vs_currency.clone(), *limit, *timeout)?
                .with_max_chars(body_limit),
        ),
    };
    Ok(source)
}
