/// Market Dashboard - Shared Library
///
/// Client-side data synchronisation and presentation state for a polling
/// market dashboard:
/// - REST client for the market-data backend with per-endpoint timeouts
/// - Per-panel fetch controllers that only honour the latest request
/// - A refresh scheduler driven by a single tick
/// - Symbol selection with parallel candlestick and volume fetches
/// - Memoised derived metrics and the top-level view state
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{
    ApiStatus, ChartDataset, ChartKind, CorrelationDataset, HeatmapDataset, MarketSummary,
    PerformanceMetrics, Stock, StockPrice, SymbolList, Timeframe,
};

pub use shared::client::{Endpoint, HttpMarketDataApi, MarketDataApi, PRICE_HISTORY_DAYS};
pub use shared::config::{Cadences, DashboardConfig, EndpointTimeouts, MIN_TICK_INTERVAL};
pub use shared::error::{FetchError, FetchErrorKind, SelectionError};

pub use shared::composer::{compose, DashboardView};
pub use shared::dashboard::{Dashboard, DashboardSnapshot};
pub use shared::metrics::{
    compute, format_change_percent, format_market_cap, format_price, format_volume,
    DerivedMetrics, MetricsMemo,
};
pub use shared::panel::{PanelId, PanelState, PanelStatus, RequestToken, Resolution};
pub use shared::scheduler::RefreshScheduler;
pub use shared::selection::{
    fetch_chart_pair, ChartPair, SelectionCoordinator, SelectionState, SelectionTicket,
};
