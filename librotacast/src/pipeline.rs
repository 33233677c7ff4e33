//! One publish cycle, start to finish
//!
//! The pipeline owns every collaborator of a cycle: the content source, the
//! publisher, the durable history and media state, the clock and the random
//! source. `run_cycle` borrows it mutably, so two cycles can never overlap.
//!
//! A cycle walks `Idle → Fetching → Selecting → Filtering → Picking →
//! Publishing → Recording → Idle` and may stop early at any step. Every stop
//! is reported as a [`CycleOutcome`]; collaborator failures never escape as
//! errors.

use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::accounts::{select_account, MAX_ACCOUNTS};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, MediaMode};
use crate::error::{PublishError, Result, RotacastError, StorageError};
use crate::history::HistoryStore;
use crate::media::MediaPool;
use crate::publishers::{create_publisher, Publisher};
use crate::retry::RetryPolicy;
use crate::sources::{create_source, normalize_items, ContentSource};
use crate::types::{AccountId, ContentItem, MediaRef, Payload};

/// Format of the optional trailing annotation
pub const ANNOTATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Selecting,
    Filtering,
    Picking,
    Publishing,
    Recording,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Selecting => "selecting",
            CycleState::Filtering => "filtering",
            CycleState::Picking => "picking",
            CycleState::Publishing => "publishing",
            CycleState::Recording => "recording",
        };
        f.write_str(name)
    }
}

/// How a cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// The item was published and recorded
    Published {
        account: AccountId,
        content_id: String,
        media: Option<MediaRef>,
        external_id: Option<String>,
    },
    /// The source returned nothing, or failed on every attempt
    NoContent,
    /// Every candidate was already published to the active account
    NothingEligible { account: AccountId },
    /// The publisher refused or timed out; history is untouched
    PublishFailed {
        account: AccountId,
        content_id: String,
        error: PublishError,
    },
    /// Persisting media usage or history failed
    StorageFailed {
        account: AccountId,
        content_id: String,
        error: StorageError,
    },
}

impl CycleOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, CycleOutcome::Published { .. })
    }

    /// Short name for logs
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Published { .. } => "published",
            CycleOutcome::NoContent => "no_content",
            CycleOutcome::NothingEligible { .. } => "nothing_eligible",
            CycleOutcome::PublishFailed { .. } => "publish_failed",
            CycleOutcome::StorageFailed { .. } => "storage_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub media_mode: MediaMode,
    /// Append "Posted at: ..." to every body
    pub annotate_timestamp: bool,
    pub publish_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            media_mode: MediaMode::Always,
            annotate_timestamp: true,
            publish_timeout: Duration::from_secs(30),
        }
    }
}

pub struct PublishingPipeline {
    source: Box<dyn ContentSource>,
    publisher: Box<dyn Publisher>,
    accounts: Vec<AccountId>,
    history: HistoryStore,
    media: MediaPool,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    options: PipelineOptions,
    state: CycleState,
}

impl PublishingPipeline {
    /// Assemble a pipeline from its collaborators.
    ///
    /// Uses the system clock, an entropy-seeded random source, the default
    /// retry policy and default options; override with the `with_*` methods.
    ///
    /// # Errors
    ///
    /// `RotacastError::InvalidInput` if `accounts` is empty or holds more
    /// accounts than the hour has minutes.
    pub fn new(
        source: Box<dyn ContentSource>,
        publisher: Box<dyn Publisher>,
        accounts: Vec<AccountId>,
        history: HistoryStore,
        media: MediaPool,
    ) -> Result<Self> {
        if accounts.is_empty() {
            return Err(RotacastError::InvalidInput(
                "at least one account is required".to_string(),
            ));
        }
        if accounts.len() > MAX_ACCOUNTS {
            return Err(RotacastError::InvalidInput(format!(
                "at most {} accounts are supported (got {})",
                MAX_ACCOUNTS,
                accounts.len()
            )));
        }

        Ok(Self {
            source,
            publisher,
            accounts,
            history,
            media,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            rng: StdRng::from_entropy(),
            options: PipelineOptions::default(),
            state: CycleState::Idle,
        })
    }

    /// Build everything from configuration: source, publisher, persisted
    /// state and policies.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = create_source(&config.source, config.body_char_limit())?;
        let publisher = create_publisher(config)?;
        let history = HistoryStore::load(config.history_path(), config.dedup.to_policy()?);
        let media = MediaPool::load(config.media.catalog_source(), config.media_usage_path());

        info!(
            source = source.name(),
            publisher = publisher.name(),
            accounts = config.accounts.len(),
            history = %history.path().display(),
            "Pipeline ready"
        );

        Ok(Self::new(source, publisher, config.account_ids(), history, media)?
            .with_retry(config.retry.to_policy(config.source.timeout()))
            .with_options(PipelineOptions {
                media_mode: config.media.mode,
                annotate_timestamp: config.publish.annotate_timestamp,
                publish_timeout: config.publish.timeout,
            }))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn media(&self) -> &MediaPool {
        &self.media
    }

    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run one full cycle. Never fails; see [`CycleOutcome`].
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.cycle().await;
        self.enter(CycleState::Idle);

        match &outcome {
            CycleOutcome::Published {
                account,
                content_id,
                external_id,
                ..
            } => info!(
                account = %account,
                content_id = %content_id,
                external_id = ?external_id,
                "Published"
            ),
            other => debug!(outcome = other.label(), "Cycle finished without publishing"),
        }
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let now = self.clock.now();
        let minute = now.minute();

        self.enter(CycleState::Fetching);
        let source = &self.source;
        let items = match self.retry.run(source.name(), || source.fetch()).await {
            Some(items) => normalize_items(items),
            None => {
                warn!(source = source.name(), "Fetch failed, skipping cycle");
                return CycleOutcome::NoContent;
            }
        };
        if items.is_empty() {
            info!(source = self.source.name(), "No content available");
            return CycleOutcome::NoContent;
        }

        self.enter(CycleState::Selecting);
        let Some(account) = select_account(minute, &self.accounts).cloned() else {
            error!("No accounts to publish to");
            return CycleOutcome::NoContent;
        };
        debug!(account = %account, minute, "Selected account");

        self.enter(CycleState::Filtering);
        let candidates = items.len();
        let eligible: Vec<ContentItem> = items
            .into_iter()
            .filter(|item| !self.history.is_duplicate(&account, &item.id, now))
            .collect();
        debug!(account = %account, candidates, eligible = eligible.len(), "Filtered candidates");
        if eligible.is_empty() {
            info!(account = %account, "Everything already published to this account");
            return CycleOutcome::NothingEligible { account };
        }

        self.enter(CycleState::Picking);
        let Some(item) = eligible.choose(&mut self.rng).cloned() else {
            return CycleOutcome::NothingEligible { account };
        };
        debug!(account = %account, content_id = %item.id, "Picked item");

        self.enter(CycleState::Publishing);
        let media = if self.wants_media(&item) {
            match self.media.draw_preferred(item.media_hint.as_deref()) {
                Ok(media) => media,
                Err(e) => {
                    error!(account = %account, content_id = %item.id, error = %e, "Failed to persist media draw");
                    return CycleOutcome::StorageFailed {
                        account,
                        content_id: item.id,
                        error: e,
                    };
                }
            }
        } else {
            None
        };

        let payload = Payload {
            body: compose_body(&item.body, now, self.options.annotate_timestamp),
            media,
        };

        let limit = self.options.publish_timeout;
        let published = match timeout(limit, self.publisher.publish(&account, &payload)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(limit)),
        };
        let receipt = match published {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    account = %account,
                    content_id = %item.id,
                    publisher = self.publisher.name(),
                    error = %e,
                    "Publish failed"
                );
                return CycleOutcome::PublishFailed {
                    account,
                    content_id: item.id,
                    error: e,
                };
            }
        };

        self.enter(CycleState::Recording);
        if let Err(e) = self.history.record(&account, &item.id, self.clock.now()) {
            error!(
                account = %account,
                content_id = %item.id,
                error = %e,
                "Published but failed to record history"
            );
            return CycleOutcome::StorageFailed {
                account,
                content_id: item.id,
                error: e,
            };
        }

        CycleOutcome::Published {
            account,
            content_id: item.id,
            media: payload.media,
            external_id: receipt.external_id,
        }
    }

    fn wants_media(&self, item: &ContentItem) -> bool {
        match self.options.media_mode {
            MediaMode::Always => true,
            MediaMode::Hinted => item.media_hint.is_some(),
            MediaMode::Never => false,
        }
    }

    fn enter(&mut self, state: CycleState) {
        debug!(from = %self.state, state = %state, "Cycle transition");
        self.state = state;
    }
}

/// Final post text, optionally stamped with the publish time
/// Characters the timestamp annotation adds to a body
pub fn annotation_len() -> usize {
    compose_body("", DateTime::<Utc>::default(), true).chars().count()
}

pub fn compose_body(body: &str, at: DateTime<Utc>, annotate: bool) -> String {
    if annotate {
        format!("{}\n\nPosted at: {}", body, at.format(ANNOTATION_FORMAT))
    } else {
        body.to_string()
    }
}
