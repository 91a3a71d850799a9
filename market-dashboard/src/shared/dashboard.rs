//! Dashboard coordinator
//!
//! Owns every panel controller, the selection coordinator, the refresh
//! scheduler and the metrics memo behind a single mutex. The lock is only
//! held for synchronous transitions; fetches run as spawned tasks that take
//! the lock again to resolve.

use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::abortable;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::client::MarketDataApi;
use super::composer::{compose, DashboardView};
use super::config::{DashboardConfig, MIN_TICK_INTERVAL};
use super::error::{FetchError, SelectionError};
use super::metrics::{DerivedMetrics, MetricsMemo};
use super::panel::{PanelController, PanelId, PanelState, Resolution};
use super::scheduler::RefreshScheduler;
use super::selection::{
    fetch_chart_pair, ChartPair, SelectionCoordinator, SelectionState, SelectionTicket,
};
use super::types::{CorrelationDataset, HeatmapDataset, MarketSummary, SymbolList, Timeframe};

struct Panels {
    summary: PanelController<MarketSummary>,
    symbols: PanelController<SymbolList>,
    chart: PanelController<ChartPair>,
    heatmap: PanelController<HeatmapDataset>,
    correlation: PanelController<CorrelationDataset>,
}

impl Panels {
    fn new() -> Self {
        Self {
            summary: PanelController::new(PanelId::Summary),
            symbols: PanelController::new(PanelId::Symbols),
            chart: PanelController::new(PanelId::Chart),
            heatmap: PanelController::new(PanelId::Heatmap),
            correlation: PanelController::new(PanelId::Correlation),
        }
    }

    fn summary_mut(&mut self) -> &mut PanelController<MarketSummary> {
        &mut self.summary
    }

    fn symbols_mut(&mut self) -> &mut PanelController<SymbolList> {
        &mut self.symbols
    }

    fn chart_mut(&mut self) -> &mut PanelController<ChartPair> {
        &mut self.chart
    }

    fn heatmap_mut(&mut self) -> &mut PanelController<HeatmapDataset> {
        &mut self.heatmap
    }

    fn correlation_mut(&mut self) -> &mut PanelController<CorrelationDataset> {
        &mut self.correlation
    }

    fn teardown(&mut self, panel: PanelId) {
        match panel {
            PanelId::Summary => self.summary.teardown(),
            PanelId::Symbols => self.symbols.teardown(),
            PanelId::Chart => self.chart.teardown(),
            PanelId::Heatmap => self.heatmap.teardown(),
            PanelId::Correlation => self.correlation.teardown(),
        }
    }
}

struct Inner {
    panels: Panels,
    selection: SelectionCoordinator,
    scheduler: RefreshScheduler,
    metrics: MetricsMemo,
    driver: Option<JoinHandle<()>>,
    torn_down: bool,
}

/// Point-in-time copy of everything the page renders
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub view: DashboardView,
    pub selection: SelectionState,
    pub summary: PanelState<MarketSummary>,
    pub metrics: Option<Arc<DerivedMetrics>>,
    pub symbols: PanelState<SymbolList>,
    pub chart: PanelState<ChartPair>,
    pub heatmap: PanelState<HeatmapDataset>,
    pub correlation: PanelState<CorrelationDataset>,
}

/// Handle to the shared dashboard state. Cheap to clone.
#[derive(Clone)]
pub struct Dashboard {
    api: Arc<dyn MarketDataApi>,
    config: Arc<DashboardConfig>,
    inner: Arc<Mutex<Inner>>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn MarketDataApi>, config: DashboardConfig) -> Result<Self, SelectionError> {
        let selection = SelectionState::new(&config.default_symbol, config.default_timeframe)?;

        let inner = Inner {
            panels: Panels::new(),
            selection: SelectionCoordinator::new(selection),
            scheduler: RefreshScheduler::new(),
            metrics: MetricsMemo::new(),
            driver: None,
            torn_down: false,
        };

        Ok(Self {
            api,
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Arm every panel, fetch each once immediately and start the scheduler
    /// tick. Must be called from within a tokio runtime.
    pub fn mount(&self) {
        let mut inner = self.inner.lock();
        if inner.driver.is_some() || inner.torn_down {
            debug!("dashboard already mounted");
            return;
        }

        let now = Instant::now();
        for panel in PanelId::ALL {
            inner
                .scheduler
                .mount(panel, self.config.cadences.for_panel(panel), now);
        }
        for panel in PanelId::ALL {
            self.dispatch(&mut inner, panel);
        }

        inner.driver = Some(tokio::spawn(drive(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.api),
            Arc::clone(&self.config),
        )));

        info!(selection = %inner.selection.current(), "dashboard mounted");
    }

    /// Out-of-band fetch for one panel, leaving its cadence untouched.
    ///
    /// Returns false if the panel is not mounted or has been torn down.
    pub fn refresh(&self, panel: PanelId) -> bool {
        let mut inner = self.inner.lock();
        self.dispatch(&mut inner, panel)
    }

    pub fn refresh_all(&self) {
        let mut inner = self.inner.lock();
        for panel in PanelId::ALL {
            self.dispatch(&mut inner, panel);
        }
    }

    /// Global retry: re-triggers the summary and symbol list only
    pub fn retry(&self) -> bool {
        let mut inner = self.inner.lock();
        info!("global retry");
        let summary = self.dispatch(&mut inner, PanelId::Summary);
        let symbols = self.dispatch(&mut inner, PanelId::Symbols);
        summary && symbols
    }

    /// Change the chart selection and fan out a fresh candlestick and volume
    /// fetch for it.
    pub fn select(&self, symbol: &str, timeframe: Timeframe) -> Result<(), SelectionError> {
        let mut inner = self.inner.lock();

        let previous = inner.selection.current().clone();
        let ticket = inner.selection.select(symbol, timeframe)?;
        if *ticket.selection() != previous {
            inner.panels.chart.invalidate();
        }

        self.dispatch_chart(&mut inner, ticket);
        Ok(())
    }

    pub fn selection(&self) -> SelectionState {
        self.inner.lock().selection.current().clone()
    }

    /// Disarm `panel` and cancel its request in flight
    pub fn teardown_panel(&self, panel: PanelId) {
        let mut inner = self.inner.lock();
        inner.scheduler.teardown(panel);
        inner.panels.teardown(panel);
    }

    /// Stop the scheduler and tear down every panel
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            return;
        }

        inner.torn_down = true;
        if let Some(driver) = inner.driver.take() {
            driver.abort();
        }
        for panel in PanelId::ALL {
            inner.scheduler.teardown(panel);
            inner.panels.teardown(panel);
        }
        info!("dashboard torn down");
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let mut inner = self.inner.lock();

        let summary = inner.panels.summary.state().clone();
        let metrics = summary.data.as_ref().map(|data| inner.metrics.get(data));

        DashboardSnapshot {
            view: compose(&summary),
            selection: inner.selection.current().clone(),
            metrics,
            summary,
            symbols: inner.panels.symbols.state().clone(),
            chart: inner.panels.chart.state().clone(),
            heatmap: inner.panels.heatmap.state().clone(),
            correlation: inner.panels.correlation.state().clone(),
        }
    }

    /// How many times derived metrics have been computed
    pub fn metrics_computations(&self) -> u64 {
        self.inner.lock().metrics.computations()
    }

    fn dispatch(&self, inner: &mut Inner, panel: PanelId) -> bool {
        let api = Arc::clone(&self.api);
        match panel {
            PanelId::Summary => self.spawn_fetch(
                inner,
                Panels::summary_mut,
                async move { api.market_summary().await },
                None,
            ),
            PanelId::Symbols => self.spawn_fetch(
                inner,
                Panels::symbols_mut,
                async move { api.symbols().await },
                None,
            ),
            PanelId::Chart => {
                let ticket = inner.selection.ticket();
                self.dispatch_chart(inner, ticket)
            }
            PanelId::Heatmap => self.spawn_fetch(
                inner,
                Panels::heatmap_mut,
                async move { api.heatmap().await },
                None,
            ),
            PanelId::Correlation => self.spawn_fetch(
                inner,
                Panels::correlation_mut,
                async move { api.correlation().await },
                None,
            ),
        }
    }

    fn dispatch_chart(&self, inner: &mut Inner, ticket: SelectionTicket) -> bool {
        let api = Arc::clone(&self.api);
        let selection = ticket.selection().clone();
        self.spawn_fetch(
            inner,
            Panels::chart_mut,
            async move { fetch_chart_pair(api.as_ref(), &selection).await },
            Some(ticket),
        )
    }

    /// Begin a fetch on the selected controller and resolve it from a
    /// spawned task. When `ticket` is set the result is also dropped if the
    /// selection has moved on by the time it arrives.
    fn spawn_fetch<T, Fut>(
        &self,
        inner: &mut Inner,
        controller: fn(&mut Panels) -> &mut PanelController<T>,
        request: Fut,
        ticket: Option<SelectionTicket>,
    ) -> bool
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let panel = controller(&mut inner.panels).id();
        if !inner.scheduler.trigger(panel) {
            debug!(%panel, "panel not mounted, skipping fetch");
            return false;
        }

        let Some(token) = controller(&mut inner.panels).begin() else {
            return false;
        };

        let (request, handle) = abortable(request);
        controller(&mut inner.panels).track(token, handle);

        let shared = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let Ok(result) = request.await else {
                debug!(%panel, generation = token.generation(), "request cancelled");
                return;
            };

            let mut inner = shared.lock();
            if let Some(ticket) = &ticket {
                if !inner.selection.is_current(ticket) {
                    debug!(
                        %panel,
                        stale = %ticket.selection(),
                        current = %inner.selection.current(),
                        "discarding response for previous selection"
                    );
                    return;
                }
            }

            let resolution = controller(&mut inner.panels).resolve(token, result);
            if resolution == Resolution::Failed && panel == PanelId::Symbols {
                warn!("symbol list unavailable, dashboard continues without it");
            }
        });

        true
    }
}

/// Single driving tick for the scheduler. Exits once the dashboard is gone.
async fn drive(
    inner: Weak<Mutex<Inner>>,
    api: Arc<dyn MarketDataApi>,
    config: Arc<DashboardConfig>,
) {
    // `interval` panics on a zero period
    let mut ticker = tokio::time::interval(config.tick_interval.max(MIN_TICK_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately; mount already fetched everything
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let dashboard = Dashboard {
            api: Arc::clone(&api),
            config: Arc::clone(&config),
            inner,
        };

        let mut guard = dashboard.inner.lock();
        let due = guard.scheduler.due(Instant::now());
        for panel in due {
            debug!(%panel, "scheduled refresh");
            dashboard.dispatch(&mut guard, panel);
        }
    }
}
