//! Rotacast - scheduled content publishing across rotating accounts
//!
//! Each cycle fetches candidate items, picks the account that owns the
//! current minute, skips anything that account already published, attaches
//! media in fair rotation and publishes. History and media usage are JSON
//! documents rewritten atomically after every change.

pub mod accounts;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod publishers;
pub mod retry;
pub mod sources;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{Result, RotacastError};
pub use history::{DedupPolicy, HistoryStore};
pub use media::{CatalogSource, MediaPool};
pub use pipeline::{CycleOutcome, PipelineOptions, PublishingPipeline};
pub use retry::RetryPolicy;
pub use types::{AccountId, ContentItem, MediaRef, Payload, PublishReceipt};
