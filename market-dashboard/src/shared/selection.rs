//! Symbol selection coordinator
//!
//! Owns the `(symbol, timeframe)` pair that drives the chart panel. Every
//! change bumps a generation so responses for an earlier selection can be
//! recognised at resolution time, regardless of when they were dispatched.

use std::fmt;

use tracing::info;

use super::client::MarketDataApi;
use super::error::{FetchError, SelectionError};
use super::types::{ChartDataset, ChartKind, Timeframe};

/// The user-chosen chart selection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionState {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SelectionState {
    /// Build a selection, normalising the symbol to upper case. Only ticker
    /// characters are accepted since the symbol becomes a URL path segment.
    pub fn new(symbol: &str, timeframe: Timeframe) -> Result<Self, SelectionError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(SelectionError::EmptySymbol);
        }
        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(SelectionError::InvalidSymbol(symbol));
        }
        Ok(Self { symbol, timeframe })
    }
}

impl fmt::Display for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.timeframe)
    }
}

/// Proof of which selection a chart request was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    selection: SelectionState,
    generation: u64,
}

impl SelectionTicket {
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }
}

#[derive(Debug)]
pub struct SelectionCoordinator {
    current: SelectionState,
    generation: u64,
}

impl SelectionCoordinator {
    pub fn new(initial: SelectionState) -> Self {
        Self {
            current: initial,
            generation: 0,
        }
    }

    pub fn current(&self) -> &SelectionState {
        &self.current
    }

    /// Ticket for the current selection without changing it
    pub fn ticket(&self) -> SelectionTicket {
        SelectionTicket {
            selection: self.current.clone(),
            generation: self.generation,
        }
    }

    /// Replace the selection. Selecting the same pair again still yields a
    /// new ticket, so a fresh fetch supersedes any in flight.
    pub fn select(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<SelectionTicket, SelectionError> {
        let selection = SelectionState::new(symbol, timeframe)?;
        self.generation += 1;
        self.current = selection;
        info!(selection = %self.current, generation = self.generation, "selection changed");
        Ok(self.ticket())
    }

    /// Whether `ticket` still describes the current selection
    pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
        ticket.generation == self.generation && ticket.selection == self.current
    }
}

/// Candlestick and volume series for one selection, applied together
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPair {
    pub selection: SelectionState,
    pub candlestick: ChartDataset,
    pub volume: ChartDataset,
}

/// Fan out both chart requests for `selection` and join on the pair.
///
/// Both requests are issued before either is awaited; a failure of either
/// fails the pair.
pub async fn fetch_chart_pair(
    api: &dyn MarketDataApi,
    selection: &SelectionState,
) -> Result<ChartPair, FetchError> {
    let candlestick = api.chart(&selection.symbol, ChartKind::Candlestick, selection.timeframe);
    let volume = api.chart(&selection.symbol, ChartKind::Volume, selection.timeframe);

    let (candlestick, volume) = futures::join!(candlestick, volume);

    Ok(ChartPair {
        selection: selection.clone(),
        candlestick: candlestick?,
        volume: volume?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::FetchErrorKind;
    use crate::shared::testing::{Route, ScriptedApi};
    use std::time::Duration;

    #[test]
    fn test_selection_normalises_symbol() {
        struct TestCase {
            input: &'static str,
            expected: Result<&'static str, SelectionError>,
        }

        let tests = vec![
            TestCase {
                // TC0: already normalised
                input: "MSFT",
                expected: Ok("MSFT"),
            },
            TestCase {
                // TC1: lower case and padding
                input: "  jpm ",
                expected: Ok("JPM"),
            },
            TestCase {
                // TC2: empty
                input: "   ",
                expected: Err(SelectionError::EmptySymbol),
            },
            TestCase {
                // TC3: share-class suffix
                input: "brk.b",
                expected: Ok("BRK.B"),
            },
            TestCase {
                // TC4: path separator
                input: "BRK/B",
                expected: Err(SelectionError::InvalidSymbol("BRK/B".to_string())),
            },
            TestCase {
                // TC5: query and fragment characters
                input: "x?days=7#",
                expected: Err(SelectionError::InvalidSymbol("X?DAYS=7#".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = SelectionState::new(test.input, Timeframe::Month).map(|s| s.symbol);
            assert_eq!(
                actual.as_deref().map_err(Clone::clone),
                test.expected,
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_tickets_go_stale_on_change() {
        let initial = SelectionState::new("JPM", Timeframe::Month).unwrap();
        let mut coordinator = SelectionCoordinator::new(initial);

        let jpm = coordinator.ticket();
        assert!(coordinator.is_current(&jpm));

        let msft = coordinator.select("MSFT", Timeframe::Quarter).unwrap();
        assert!(!coordinator.is_current(&jpm));
        assert!(coordinator.is_current(&msft));
        assert_eq!(coordinator.current().symbol, "MSFT");
        assert_eq!(coordinator.current().timeframe, Timeframe::Quarter);
    }

    #[test]
    fn test_reselecting_same_pair_issues_new_ticket() {
        let initial = SelectionState::new("JPM", Timeframe::Month).unwrap();
        let mut coordinator = SelectionCoordinator::new(initial);

        let first = coordinator.select("JPM", Timeframe::Month).unwrap();
        let second = coordinator.select("JPM", Timeframe::Month).unwrap();
        assert_ne!(first, second);
        assert!(!coordinator.is_current(&first));
        assert!(coordinator.is_current(&second));
    }

    #[test]
    fn test_rejected_selection_keeps_current() {
        let initial = SelectionState::new("JPM", Timeframe::Month).unwrap();
        let mut coordinator = SelectionCoordinator::new(initial);
        let ticket = coordinator.ticket();

        assert_eq!(
            coordinator.select("", Timeframe::Week),
            Err(SelectionError::EmptySymbol)
        );
        assert!(coordinator.is_current(&ticket));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chart_pair_is_fetched_in_parallel() {
        let api = ScriptedApi::new();
        api.delay(Route::Candlestick, Duration::from_secs(2));
        api.delay(Route::Volume, Duration::from_secs(1));

        let selection = SelectionState::new("GS", Timeframe::Year).unwrap();
        let pair = fetch_chart_pair(&api, &selection).await.unwrap();

        assert_eq!(pair.selection, selection);
        assert_eq!(pair.candlestick.title(), Some("GS candlestick 365"));
        assert_eq!(pair.volume.title(), Some("GS volume 365"));
        assert_eq!(
            api.log(),
            vec![
                "start candlestick GS 365",
                "start volume GS 365",
                "end volume GS 365",
                "end candlestick GS 365",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chart_pair_fails_if_either_side_fails() {
        let api = ScriptedApi::new();
        api.fail(
            Route::Volume,
            FetchError::Timeout {
                endpoint: "/stocks/GS/chart/volume?days=30".to_string(),
                timeout_ms: 15_000,
            },
        );

        let selection = SelectionState::new("GS", Timeframe::Month).unwrap();
        let error = fetch_chart_pair(&api, &selection).await.unwrap_err();
        assert_eq!(error.kind(), FetchErrorKind::Timeout);
        assert_eq!(api.calls(Route::Candlestick), 1);
    }
}
