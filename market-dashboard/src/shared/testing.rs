//! Scripted in-memory [`MarketDataApi`] for tests
//!
//! Every route answers from a queue of scripted steps and falls back to a
//! fixture once the queue is empty. Latencies run on tokio's clock, so tests
//! drive them with a paused runtime.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::client::MarketDataApi;
use super::error::FetchError;
use super::types::{
    ChartDataset, ChartKind, CorrelationDataset, HeatmapDataset, MarketSummary, SymbolList,
    Timeframe,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Summary,
    Symbols,
    Candlestick,
    Volume,
    Heatmap,
    Correlation,
}

impl Route {
    fn name(&self) -> &'static str {
        match self {
            Route::Summary => "summary",
            Route::Symbols => "symbols",
            Route::Candlestick => "candlestick",
            Route::Volume => "volume",
            Route::Heatmap => "heatmap",
            Route::Correlation => "correlation",
        }
    }
}

struct Step {
    latency: Option<Duration>,
    result: Result<Value, FetchError>,
}

#[derive(Default)]
struct Script {
    latency: HashMap<Route, Duration>,
    symbol_latency: HashMap<String, Duration>,
    steps: HashMap<Route, VecDeque<Step>>,
    calls: HashMap<Route, usize>,
    log: Vec<String>,
}

#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default latency for every call on `route`
    pub fn delay(&self, route: Route, latency: Duration) {
        self.script.lock().latency.insert(route, latency);
    }

    /// Latency for chart calls of `symbol`, overriding the route default
    pub fn delay_symbol(&self, symbol: &str, latency: Duration) {
        self.script
            .lock()
            .symbol_latency
            .insert(symbol.to_string(), latency);
    }

    /// Queue a failure for the next call on `route`
    pub fn fail(&self, route: Route, error: FetchError) {
        self.push(route, None, Err(error));
    }

    /// Queue a failure delivered after `latency`
    pub fn fail_after(&self, route: Route, latency: Duration, error: FetchError) {
        self.push(route, Some(latency), Err(error));
    }

    pub fn calls(&self, route: Route) -> usize {
        self.script.lock().calls.get(&route).copied().unwrap_or(0)
    }

    /// `start ..`/`end ..` events in the order they happened
    pub fn log(&self) -> Vec<String> {
        self.script.lock().log.clone()
    }

    fn push(&self, route: Route, latency: Option<Duration>, result: Result<Value, FetchError>) {
        self.script
            .lock()
            .steps
            .entry(route)
            .or_default()
            .push_back(Step { latency, result });
    }

    async fn serve<T>(
        &self,
        route: Route,
        label: String,
        symbol: Option<&str>,
        fallback: Value,
    ) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let (latency, result) = {
            let mut script = self.script.lock();
            *script.calls.entry(route).or_default() += 1;
            script.log.push(format!("start {label}"));

            let default_latency = symbol
                .and_then(|symbol| script.symbol_latency.get(symbol).copied())
                .or_else(|| script.latency.get(&route).copied())
                .unwrap_or_default();

            match script.steps.get_mut(&route).and_then(VecDeque::pop_front) {
                Some(step) => (step.latency.unwrap_or(default_latency), step.result),
                None => (default_latency, Ok(fallback)),
            }
        };

        tokio::time::sleep(latency).await;
        self.script.lock().log.push(format!("end {label}"));

        serde_json::from_value(result?).map_err(|e| FetchError::Decode {
            endpoint: route.name().to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl MarketDataApi for ScriptedApi {
    async fn market_summary(&self) -> Result<MarketSummary, FetchError> {
        self.serve(Route::Summary, "summary".to_string(), None, summary_fixture())
            .await
    }

    async fn symbols(&self) -> Result<SymbolList, FetchError> {
        self.serve(Route::Symbols, "symbols".to_string(), None, symbols_fixture())
            .await
    }

    async fn chart(
        &self,
        symbol: &str,
        kind: ChartKind,
        timeframe: Timeframe,
    ) -> Result<ChartDataset, FetchError> {
        let route = match kind {
            ChartKind::Candlestick => Route::Candlestick,
            ChartKind::Volume => Route::Volume,
        };
        let label = format!("{} {} {}", kind, symbol, timeframe.days());
        self.serve(route, label, Some(symbol), chart_fixture(symbol, kind, timeframe))
            .await
    }

    async fn heatmap(&self) -> Result<HeatmapDataset, FetchError> {
        self.serve(Route::Heatmap, "heatmap".to_string(), None, blob_fixture("heatmap"))
            .await
    }

    async fn correlation(&self) -> Result<CorrelationDataset, FetchError> {
        self.serve(
            Route::Correlation,
            "correlation".to_string(),
            None,
            blob_fixture("correlation"),
        )
        .await
    }
}

pub fn stock_fixture(symbol: &str, price: f64, change_percent: f64, volume: u64) -> Value {
    json!({
        "symbol": symbol,
        "current_price": price,
        "change": price * change_percent / 100.0,
        "change_percent": change_percent,
        "volume": volume,
        "market_cap": 1_000_000_000.0,
        "pe_ratio": 21.4,
        "timestamp": "2024-03-01T14:30:00.123456"
    })
}

/// 500 symbols with AAPL leading the gainers at +5.2%
pub fn summary_fixture() -> Value {
    json!({
        "total_symbols": 500,
        "total_market_cap": 2_450_000_000_000.0,
        "total_volume": 1_234_567_890u64,
        "top_gainers": [
            stock_fixture("AAPL", 189.5, 5.2, 54_000_000),
            stock_fixture("MSFT", 411.2, 2.1, 22_000_000),
        ],
        "top_losers": [
            stock_fixture("C", 58.1, -1.1, 18_000_000),
            stock_fixture("BAC", 34.9, -3.4, 41_000_000),
        ],
        "most_active": [
            stock_fixture("BAC", 34.9, -3.4, 41_000_000),
            stock_fixture("AAPL", 189.5, 5.2, 54_000_000),
        ],
        "timestamp": "2024-03-01T14:30:00.123456"
    })
}

pub fn symbols_fixture() -> Value {
    json!({
        "symbols": ["JPM", "GS", "MS", "BAC", "C", "WFC", "AAPL", "MSFT"],
        "count": 8
    })
}

pub fn chart_fixture(symbol: &str, kind: ChartKind, timeframe: Timeframe) -> Value {
    json!({
        "data": [{"type": kind.as_str(), "name": symbol}],
        "layout": {"title": {"text": format!("{} {} {}", symbol, kind, timeframe.days())}}
    })
}

pub fn blob_fixture(title: &str) -> Value {
    json!({
        "data": [{"type": "heatmap"}],
        "layout": {"title": title}
    })
}
