//! Remote data client for the market-data REST API
//!
//! Every request is bounded by its endpoint's timeout and never retried here;
//! retry policy belongs to the panel that issued the request. Cancellation is
//! by dropping or aborting the returned future.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::config::{DashboardConfig, EndpointTimeouts};
use super::error::FetchError;
use super::types::{
    ApiStatus, ChartDataset, ChartKind, CorrelationDataset, HeatmapDataset, MarketSummary,
    PerformanceMetrics, StockPrice, SymbolList, Timeframe,
};

/// Range of `days` accepted by the price history endpoint
pub const PRICE_HISTORY_DAYS: std::ops::RangeInclusive<u32> = 1..=365;

/// Named endpoint under the `/api` base path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    MarketSummary,
    Symbols,
    Chart {
        symbol: String,
        kind: ChartKind,
        timeframe: Timeframe,
    },
    PriceHistory {
        symbol: String,
        days: u32,
    },
    Heatmap,
    Correlation,
    PerformanceMetrics,
}

impl Endpoint {
    /// Path segments below the API base. Symbols are kept verbatim here and
    /// percent-encoded by [`Endpoint::url`].
    fn segments(&self) -> Vec<&str> {
        match self {
            // The API root is served with a trailing slash
            Endpoint::Health => vec![""],
            Endpoint::MarketSummary => vec!["market", "summary"],
            Endpoint::Symbols => vec!["symbols"],
            Endpoint::Chart { symbol, kind, .. } => {
                vec!["stocks", symbol.as_str(), "chart", kind.as_str()]
            }
            Endpoint::PriceHistory { symbol, .. } => {
                vec!["stocks", symbol.as_str(), "price-history"]
            }
            Endpoint::Heatmap => vec!["market", "heatmap"],
            Endpoint::Correlation => vec!["analytics", "correlation"],
            Endpoint::PerformanceMetrics => vec!["performance", "metrics"],
        }
    }

    fn days(&self) -> Option<u32> {
        match self {
            Endpoint::Chart { timeframe, .. } => Some(timeframe.days()),
            Endpoint::PriceHistory { days, .. } => Some(*days),
            _ => None,
        }
    }

    /// Path relative to the API base, including any query string. Used for
    /// logging and error context.
    pub fn path(&self) -> String {
        let path = format!("/{}", self.segments().join("/"));
        match self.days() {
            Some(days) => format!("{}?days={}", path, days),
            None => path,
        }
    }

    /// Absolute request URL under `base`, with every path segment encoded
    pub fn url(&self, base: &str) -> Result<Url, FetchError> {
        let invalid = |message: String| FetchError::Network {
            endpoint: self.to_string(),
            message,
        };

        let mut url =
            Url::parse(base).map_err(|e| invalid(format!("invalid API base url {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("API base url {} cannot carry a path", base)))?
            .pop_if_empty()
            .extend(self.segments());

        if let Some(days) = self.days() {
            url.query_pairs_mut().append_pair("days", &days.to_string());
        }
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Datasets the dashboard panels are built from
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    async fn market_summary(&self) -> Result<MarketSummary, FetchError>;

    async fn symbols(&self) -> Result<SymbolList, FetchError>;

    async fn chart(
        &self,
        symbol: &str,
        kind: ChartKind,
        timeframe: Timeframe,
    ) -> Result<ChartDataset, FetchError>;

    async fn heatmap(&self) -> Result<HeatmapDataset, FetchError>;

    async fn correlation(&self) -> Result<CorrelationDataset, FetchError>;
}

/// reqwest-backed [`MarketDataApi`]
#[derive(Debug, Clone)]
pub struct HttpMarketDataApi {
    http: reqwest::Client,
    base_url: String,
    timeouts: EndpointTimeouts,
}

impl HttpMarketDataApi {
    pub fn new(config: &DashboardConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: &DashboardConfig) -> Self {
        Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            timeouts: config.timeouts.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Root health check
    pub async fn health(&self) -> Result<ApiStatus, FetchError> {
        self.fetch(&Endpoint::Health).await
    }

    /// Backend cache and uptime figures
    pub async fn performance_metrics(&self) -> Result<PerformanceMetrics, FetchError> {
        self.fetch(&Endpoint::PerformanceMetrics).await
    }

    /// Daily OHLCV records for `symbol`, `days` clamped to
    /// [`PRICE_HISTORY_DAYS`]
    pub async fn price_history(
        &self,
        symbol: &str,
        days: u32,
    ) -> Result<Vec<StockPrice>, FetchError> {
        let endpoint = Endpoint::PriceHistory {
            symbol: symbol.to_string(),
            days: days.clamp(*PRICE_HISTORY_DAYS.start(), *PRICE_HISTORY_DAYS.end()),
        };
        self.fetch(&endpoint).await
    }

    /// Issue a GET against `endpoint` and decode the JSON body
    pub async fn fetch<T>(&self, endpoint: &Endpoint) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let timeout = self.timeouts.for_endpoint(endpoint);
        let url = endpoint.url(&self.base_url)?;
        debug!(%endpoint, timeout_ms = timeout.as_millis() as u64, "dispatching request");

        match tokio::time::timeout(timeout, self.get_json(endpoint, url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(endpoint, timeout)),
        }
    }

    async fn get_json<T>(
        &self,
        endpoint: &Endpoint,
        url: Url,
        timeout: Duration,
    ) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(endpoint, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify(endpoint, timeout, e))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl MarketDataApi for HttpMarketDataApi {
    async fn market_summary(&self) -> Result<MarketSummary, FetchError> {
        self.fetch(&Endpoint::MarketSummary).await
    }

    async fn symbols(&self) -> Result<SymbolList, FetchError> {
        self.fetch(&Endpoint::Symbols).await
    }

    async fn chart(
        &self,
        symbol: &str,
        kind: ChartKind,
        timeframe: Timeframe,
    ) -> Result<ChartDataset, FetchError> {
        let endpoint = Endpoint::Chart {
            symbol: symbol.to_string(),
            kind,
            timeframe,
        };
        self.fetch(&endpoint).await
    }

    async fn heatmap(&self) -> Result<HeatmapDataset, FetchError> {
        self.fetch(&Endpoint::Heatmap).await
    }

    async fn correlation(&self) -> Result<CorrelationDataset, FetchError> {
        self.fetch(&Endpoint::Correlation).await
    }
}

fn timed_out(endpoint: &Endpoint, timeout: Duration) -> FetchError {
    FetchError::Timeout {
        endpoint: endpoint.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

fn classify(endpoint: &Endpoint, timeout: Duration, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        timed_out(endpoint, timeout)
    } else if error.is_decode() {
        FetchError::Decode {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Network {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        }
    }
}
