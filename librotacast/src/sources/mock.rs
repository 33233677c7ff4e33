//! Scripted content source for tests
//!
//! Each call to `fetch` consumes the next scripted response; once the script
//! runs out the last response repeats.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::sources::ContentSource;
use crate::types::ContentItem;

type Response = Result<Vec<ContentItem>, TransportError>;

#[derive(Clone)]
pub struct MockSource {
    script: Arc<Mutex<VecDeque<Response>>>,
    last: Arc<Mutex<Option<Response>>>,
    fetch_count: Arc<Mutex<usize>>,
}

impl MockSource {
    pub fn new(script: Vec<Response>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(Mutex::new(None)),
            fetch_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Always return these items
    pub fn with_items(items: Vec<ContentItem>) -> Self {
        Self::new(vec![Ok(items)])
    }

    /// Always fail with a network error
    pub fn failing(message: &str) -> Self {
        Self::new(vec![Err(TransportError::Network(message.to_string()))])
    }

    /// Number of times fetch was called
    pub fn fetch_count(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }
}

#[async_trait]
impl ContentSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self) -> Response {
        *self.fetch_count.lock().unwrap() += 1;

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last.clone().unwrap_or_else(|| Ok(Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_repeat_last() {
        let source = MockSource::new(vec![
            Err(TransportError::Status(503)),
            Ok(vec![ContentItem::new("1", "one")]),
        ]);

        assert!(source.fetch().await.is_err());
        assert_eq!(source.fetch().await.unwrap().len(), 1);
        assert_eq!(source.fetch().await.unwrap().len(), 1);
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_is_empty_feed() {
        let source = MockSource::new(vec![]);
        assert!(source.fetch().await.unwrap().is_empty());
    }
}
