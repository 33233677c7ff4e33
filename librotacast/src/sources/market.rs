//! Market snapshot source
//!
//! Pulls the top coins by market cap from a CoinGecko-compatible
//! `/coins/markets` endpoint and renders them into a single post. Each
//! snapshot gets a minute-stamped id, so every cycle produces a fresh item.
//! When a character budget is set, coins are dropped from the bottom of the
//! ranking until the rendered post fits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::sources::ContentSource;
use crate::types::ContentItem;

/// One row of the `/coins/markets` response
#[derive(Debug, Clone, Deserialize)]
pub struct MarketCoin {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default, alias = "price_change_percentage_7d")]
    pub price_change_percentage_7d_in_currency: Option<f64>,
    #[serde(default)]
    pub ath: Option<f64>,
}

pub struct MarketSource {
    client: reqwest::Client,
    base_url: String,
    vs_currency: String,
    limit: u32,
    max_chars: Option<usize>,
}

impl MarketSource {
    pub fn new(base_url: String, vs_currency: String, limit: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            vs_currency,
            limit: limit.max(1),
            max_chars: None,
        })
    }

    /// Keep rendered snapshots within `max_chars` characters
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[async_trait]
impl ContentSource for MarketSource {
    fn name(&self) -> &str {
        "market"
    }

    async fn fetch(&self) -> std::result::Result<Vec<ContentItem>, TransportError> {
        let url = format!("{}/coins/markets", self.base_url);
        let per_page = self.limit.to_string();
        debug!(url = %url, limit = self.limit, "Fetching market data");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", self.vs_currency.as_str()),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h,7d,30d"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let coins: Vec<MarketCoin> = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        debug!(count = coins.len(), "Fetched market data");

        Ok(snapshot_item(&coins, Utc::now(), self.max_chars).into_iter().collect())
    }
}

/// Render a snapshot item, or `None` when there is nothing to report.
///
/// With `max_chars` set, the lowest-ranked coins are left out until the body
/// fits. A single coin is always kept.
pub fn snapshot_item(
    coins: &[MarketCoin],
    at: DateTime<Utc>,
    max_chars: Option<usize>,
) -> Option<ContentItem> {
    if coins.is_empty() {
        return None;
    }

    let mut shown = coins.len();
    let mut body = format_snapshot(coins, at);
    if let Some(max) = max_chars {
        while shown > 1 && body.chars().count() > max {
            shown -= 1;
            body = format_snapshot(&coins[..shown], at);
        }
        if shown < coins.len() {
            debug!(shown, fetched = coins.len(), max_chars = max, "Trimmed market snapshot");
        }
    }

    Some(ContentItem::new(
        format!("market-{}", at.format("%Y-%m-%dT%H:%M")),
        body,
    ))
}

pub fn format_snapshot(coins: &[MarketCoin], at: DateTime<Utc>) -> String {
    let mut out = format!(
        "🌟 Top {} Cryptocurrencies 🌟\n\nLast Updated: {}\n\n",
        coins.len(),
        at.format("%Y-%m-%d %H:%M UTC")
    );

    for (i, coin) in coins.iter().enumerate() {
        let change_24h = coin.price_change_percentage_24h.unwrap_or(0.0);
        let change_7d = coin.price_change_percentage_7d_in_currency.unwrap_or(0.0);

        let _ = write!(
            out,
            "{}. {} ({}) {}\n💰 Price: ${}\n📊 Market Cap: {}\n📈 24h: {:+.2}%\n📊 7d: {:+.2}%\n💎 ATH: ${}\n\n",
            i + 1,
            coin.name,
            coin.symbol.to_uppercase(),
            trend_emoji(change_24h),
            format_price(coin.current_price.unwrap_or(0.0)),
            format_market_cap(coin.market_cap.unwrap_or(0.0)),
            change_24h,
            change_7d,
            format_price(coin.ath.unwrap_or(0.0)),
        );
    }

    out.trim_end().to_string()
}

/// Market cap with a B or M suffix
pub fn format_market_cap(market_cap: f64) -> String {
    if market_cap >= 1_000_000_000.0 {
        format!("${:.2}B", market_cap / 1_000_000_000.0)
    } else {
        format!("${:.2}M", market_cap / 1_000_000.0)
    }
}

pub fn trend_emoji(change: f64) -> &'static str {
    if change >= 5.0 {
        "🚀"
    } else if change > 0.0 {
        "📈"
    } else if change > -5.0 {
        "📉"
    } else {
        "💥"
    }
}

/// Two decimals with thousands separators, e.g. `67,012.50`
fn format_price(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}
