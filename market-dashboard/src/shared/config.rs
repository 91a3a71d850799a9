//! Dashboard configuration
//!
//! Defaults match the market-data backend's local deployment; every value can
//! be overridden from the environment via [`DashboardConfig::from_env`].
use std::time::Duration;

use tracing::warn;

use super::client::Endpoint;
use super::panel::PanelId;
use super::types::Timeframe;

/// Shortest scheduler tick accepted; a zero period cannot drive a timer
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Per-endpoint request timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTimeouts {
    pub summary: Duration,
    pub symbols: Duration,
    pub chart: Duration,
    pub heatmap: Duration,
    pub correlation: Duration,
    /// Health check and backend metrics
    pub auxiliary: Duration,
}

impl Default for EndpointTimeouts {
    fn default() -> Self {
        Self {
            summary: Duration::from_secs(10),
            symbols: Duration::from_secs(10),
            chart: Duration::from_secs(15),
            heatmap: Duration::from_secs(15),
            correlation: Duration::from_secs(15),
            auxiliary: Duration::from_secs(10),
        }
    }
}

impl EndpointTimeouts {
    /// Same timeout for every endpoint
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            summary: timeout,
            symbols: timeout,
            chart: timeout,
            heatmap: timeout,
            correlation: timeout,
            auxiliary: timeout,
        }
    }

    pub fn for_endpoint(&self, endpoint: &Endpoint) -> Duration {
        match endpoint {
            Endpoint::MarketSummary => self.summary,
            Endpoint::Symbols => self.symbols,
            Endpoint::Chart { .. } | Endpoint::PriceHistory { .. } => self.chart,
            Endpoint::Heatmap => self.heatmap,
            Endpoint::Correlation => self.correlation,
            Endpoint::Health | Endpoint::PerformanceMetrics => self.auxiliary,
        }
    }
}

/// Polling cadence per panel. `None` means the panel is fetched on mount and
/// afterwards only on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cadences {
    pub summary: Option<Duration>,
    pub symbols: Option<Duration>,
    pub chart: Option<Duration>,
    pub heatmap: Option<Duration>,
    pub correlation: Option<Duration>,
}

impl Default for Cadences {
    fn default() -> Self {
        Self {
            summary: Some(Duration::from_secs(30)),
            symbols: None,
            chart: None,
            heatmap: Some(Duration::from_secs(60)),
            correlation: Some(Duration::from_secs(120)),
        }
    }
}

impl Cadences {
    pub fn for_panel(&self, panel: PanelId) -> Option<Duration> {
        match panel {
            PanelId::Summary => self.summary,
            PanelId::Symbols => self.symbols,
            PanelId::Chart => self.chart,
            PanelId::Heatmap => self.heatmap,
            PanelId::Correlation => self.correlation,
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// API base URL including the `/api` prefix
    pub api_url: String,
    /// Symbol selected at startup
    pub default_symbol: String,
    /// Timeframe selected at startup
    pub default_timeframe: Timeframe,
    pub timeouts: EndpointTimeouts,
    pub cadences: Cadences,
    /// Resolution of the scheduler's single driving tick
    pub tick_interval: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8001/api".to_string(),
            default_symbol: "JPM".to_string(),
            default_timeframe: Timeframe::Month,
            timeouts: EndpointTimeouts::default(),
            cadences: Cadences::default(),
            tick_interval: Duration::from_millis(500),
        }
    }
}

impl DashboardConfig {
    /// Create a new configuration with custom API URL
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Read configuration from `DASHBOARD_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::new(env_str("DASHBOARD_API_URL", "http://127.0.0.1:8001/api"));

        if let Some(symbol) = env_opt("DASHBOARD_SYMBOL") {
            config.default_symbol = symbol.to_uppercase();
        }

        if let Some(days) = env_opt("DASHBOARD_TIMEFRAME").and_then(|s| s.parse::<u32>().ok()) {
            match Timeframe::try_from(days) {
                Ok(timeframe) => config.default_timeframe = timeframe,
                Err(error) => warn!(%error, "ignoring DASHBOARD_TIMEFRAME"),
            }
        }

        if let Some(secs) = env_opt("DASHBOARD_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.timeouts = EndpointTimeouts::uniform(Duration::from_secs(secs));
        }

        if let Some(ms) = env_opt("DASHBOARD_TICK_MS").and_then(|s| s.parse::<u64>().ok()) {
            config.tick_interval = Duration::from_millis(ms).max(MIN_TICK_INTERVAL);
        }

        config
    }

    /// Set the symbol selected at startup
    pub fn with_default_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.default_symbol = symbol.into();
        self
    }

    /// Set the timeframe selected at startup
    pub fn with_default_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.default_timeframe = timeframe;
        self
    }

    /// Set request timeouts
    pub fn with_timeouts(mut self, timeouts: EndpointTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set polling cadences
    pub fn with_cadences(mut self, cadences: Cadences) -> Self {
        self.cadences = cadences;
        self
    }

    /// Set scheduler tick resolution, clamped to [`MIN_TICK_INTERVAL`]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        self
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}
