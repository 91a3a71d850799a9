//! Per-panel fetch state machine
//!
//! `idle -> loading -> {ready, error}`, re-entering `loading` on every new
//! fetch. Each dispatch is tagged with a fresh [`RequestToken`]; only the
//! latest token's result is applied so out-of-order completions cannot
//! overwrite newer data.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::AbortHandle;
use tracing::{debug, warn};

use super::error::FetchError;

/// Independently fetched unit of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelId {
    Summary,
    Symbols,
    Chart,
    Heatmap,
    Correlation,
}

impl PanelId {
    pub const ALL: [PanelId; 5] = [
        PanelId::Summary,
        PanelId::Symbols,
        PanelId::Chart,
        PanelId::Heatmap,
        PanelId::Correlation,
    ];

    /// Human readable dataset name
    pub fn label(&self) -> &'static str {
        match self {
            PanelId::Summary => "market summary",
            PanelId::Symbols => "symbols",
            PanelId::Chart => "chart data",
            PanelId::Heatmap => "heatmap",
            PanelId::Correlation => "correlation matrix",
        }
    }

    /// User-facing message recorded when a fetch fails
    pub fn failure_message(&self) -> String {
        format!("Failed to load {}", self.label())
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Observable state of one panel
///
/// `data` is shared by reference so that consumers can detect "same payload"
/// with [`Arc::ptr_eq`].
#[derive(Debug)]
pub struct PanelState<T> {
    pub status: PanelStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl<T> PanelState<T> {
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.status == PanelStatus::Loading
    }
}

impl<T> Default for PanelState<T> {
    fn default() -> Self {
        Self {
            status: PanelStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
        }
    }
}

impl<T> Clone for PanelState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
        }
    }
}

/// Generation number identifying one dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Outcome of feeding a response back into a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Payload replaced, status `ready`
    Applied,
    /// Failure recorded, previous payload kept
    Failed,
    /// Superseded by a newer request; nothing written
    Stale,
    /// Panel torn down; nothing written
    TornDown,
}

/// Owner of a single panel's [`PanelState`]
#[derive(Debug)]
pub struct PanelController<T> {
    id: PanelId,
    state: PanelState<T>,
    issued: u64,
    in_flight: Option<AbortHandle>,
    torn_down: bool,
}

impl<T> PanelController<T> {
    pub fn new(id: PanelId) -> Self {
        Self {
            id,
            state: PanelState::default(),
            issued: 0,
            in_flight: None,
            torn_down: false,
        }
    }

    pub fn id(&self) -> PanelId {
        self.id
    }

    pub fn state(&self) -> &PanelState<T> {
        &self.state
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Enter `loading` and issue a token for the new request.
    ///
    /// Returns `None` once the panel has been torn down.
    pub fn begin(&mut self) -> Option<RequestToken> {
        if self.torn_down {
            debug!(panel = %self.id, "refusing fetch for torn down panel");
            return None;
        }

        self.issued += 1;
        self.state.status = PanelStatus::Loading;
        self.state.error = None;

        debug!(panel = %self.id, generation = self.issued, "fetch dispatched");
        Some(RequestToken(self.issued))
    }

    /// Remember the cancel handle of the request issued under `token`
    pub fn track(&mut self, token: RequestToken, handle: AbortHandle) {
        if self.is_current(token) {
            self.in_flight = Some(handle);
        } else {
            handle.abort();
        }
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        !self.torn_down && token.0 == self.issued
    }

    /// Apply the result of the request issued under `token`
    pub fn resolve(&mut self, token: RequestToken, result: Result<T, FetchError>) -> Resolution {
        if self.torn_down {
            debug!(panel = %self.id, generation = token.0, "discarding response for torn down panel");
            return Resolution::TornDown;
        }

        if token.0 != self.issued {
            debug!(
                panel = %self.id,
                generation = token.0,
                latest = self.issued,
                "discarding superseded response"
            );
            return Resolution::Stale;
        }

        self.in_flight = None;

        match result {
            Ok(payload) => {
                self.state.data = Some(Arc::new(payload));
                self.state.status = PanelStatus::Ready;
                self.state.error = None;
                self.state.last_fetched_at = Some(Utc::now());
                Resolution::Applied
            }
            Err(error) => {
                warn!(
                    panel = %self.id,
                    kind = %error.kind(),
                    %error,
                    kept_previous = self.state.has_data(),
                    "panel fetch failed"
                );
                self.state.status = PanelStatus::Error;
                self.state.error = Some(self.id.failure_message());
                Resolution::Failed
            }
        }
    }

    /// Drop the retained payload once it no longer matches the panel's inputs
    pub fn invalidate(&mut self) {
        if self.torn_down {
            return;
        }
        self.state.data = None;
        self.state.last_fetched_at = None;
    }

    /// Stop accepting fetches and cancel the request in flight, if any
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        self.torn_down = true;
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        debug!(panel = %self.id, "panel torn down");
    }
}
