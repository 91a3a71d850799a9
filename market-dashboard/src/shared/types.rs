//! Core data types for the market-data REST contract
//!
//! These types match the JSON payloads served under `/api` by the market-data
//! backend. Chart, heatmap and correlation payloads are opaque plot
//! specifications and are only passed through.
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::SelectionError;

/// Point-in-time quote for a single symbol
///
/// Superseded wholesale on every summary fetch, never patched in place.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Stock {
    pub symbol: String,
    pub current_price: Decimal,
    pub change: Decimal,
    /// Percent change, already scaled (5.2 means +5.2%)
    pub change_percent: Decimal,
    pub volume: u64,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    #[serde(default)]
    pub pe_ratio: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_instant")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Daily OHLCV record from the price history endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StockPrice {
    pub symbol: String,
    #[serde(deserialize_with = "de_instant")]
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    #[serde(default)]
    pub vwap: Option<Decimal>,
}

/// Market-wide summary with ranked movers
///
/// The ranked sequences are re-sorted on decode so that consumers can rely on
/// their order: gainers descending by change, losers ascending by change,
/// most active descending by volume.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketSummary {
    pub total_symbols: u64,
    pub total_market_cap: Decimal,
    pub total_volume: u64,
    #[serde(deserialize_with = "de_gainers")]
    pub top_gainers: Vec<Stock>,
    #[serde(deserialize_with = "de_losers")]
    pub top_losers: Vec<Stock>,
    #[serde(deserialize_with = "de_most_active")]
    pub most_active: Vec<Stock>,
    #[serde(deserialize_with = "de_instant")]
    pub timestamp: DateTime<Utc>,
}

/// Opaque plot specification (`{data: [trace..], layout: {..}}`)
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ChartDataset {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub layout: serde_json::Value,
}

impl ChartDataset {
    pub fn trace_count(&self) -> usize {
        self.data.len()
    }

    /// Plot title from the layout hints, if the backend supplied one.
    ///
    /// Accepts both `"title": "..."` and `"title": {"text": "..."}`.
    pub fn title(&self) -> Option<&str> {
        let title = self.layout.get("title")?;
        title
            .as_str()
            .or_else(|| title.get("text").and_then(|text| text.as_str()))
    }
}

pub type HeatmapDataset = ChartDataset;
pub type CorrelationDataset = ChartDataset;

/// Available symbol universe
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SymbolList {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// Response of the API root health check
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiStatus {
    pub message: String,
    pub status: String,
}

impl ApiStatus {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Backend cache and uptime figures
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PerformanceMetrics {
    #[serde(default)]
    pub cache_size: u64,
    #[serde(default)]
    pub cache_maxsize: u64,
    #[serde(default)]
    pub cache_ttl: u64,
    #[serde(default)]
    pub active_symbols: u64,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub avg_response_time: String,
}

/// Series flavour served by the chart endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Candlestick,
    Volume,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Candlestick => "candlestick",
            ChartKind::Volume => "volume",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chart lookback window in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Timeframe {
    Week,
    #[default]
    Month,
    Quarter,
    HalfYear,
    Year,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::Week,
        Timeframe::Month,
        Timeframe::Quarter,
        Timeframe::HalfYear,
        Timeframe::Year,
    ];

    pub fn days(&self) -> u32 {
        match self {
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Quarter => 90,
            Timeframe::HalfYear => 180,
            Timeframe::Year => 365,
        }
    }

    /// Next longer window, wrapping back to a week after a year
    pub fn next(&self) -> Self {
        match self {
            Timeframe::Week => Timeframe::Month,
            Timeframe::Month => Timeframe::Quarter,
            Timeframe::Quarter => Timeframe::HalfYear,
            Timeframe::HalfYear => Timeframe::Year,
            Timeframe::Year => Timeframe::Week,
        }
    }
}

impl TryFrom<u32> for Timeframe {
    type Error = SelectionError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Timeframe::ALL
            .into_iter()
            .find(|timeframe| timeframe.days() == days)
            .ok_or(SelectionError::InvalidTimeframe(days))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.days())
    }
}

/// Parse an ISO-8601 instant, treating offset-less values as UTC
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn de_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid instant: {raw}")))
}

fn de_opt_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_instant(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid instant: {raw}"))),
        None => Ok(None),
    }
}

fn de_gainers<'de, D>(deserializer: D) -> Result<Vec<Stock>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut stocks = Vec::<Stock>::deserialize(deserializer)?;
    stocks.sort_by(|a, b| b.change_percent.cmp(&a.change_percent));
    Ok(stocks)
}

fn de_losers<'de, D>(deserializer: D) -> Result<Vec<Stock>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut stocks = Vec::<Stock>::deserialize(deserializer)?;
    stocks.sort_by(|a, b| a.change_percent.cmp(&b.change_percent));
    Ok(stocks)
}

fn de_most_active<'de, D>(deserializer: D) -> Result<Vec<Stock>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut stocks = Vec::<Stock>::deserialize(deserializer)?;
    stocks.sort_by(|a, b| b.volume.cmp(&a.volume));
    Ok(stocks)
}
