//! Top-level view state derived from the summary panel
//!
//! First-load failures block the page; failures after a successful load keep
//! the last good data on screen.

use super::panel::{PanelState, PanelStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    Loading,
    Error { message: String },
    Ready,
}

impl DashboardView {
    pub fn is_ready(&self) -> bool {
        matches!(self, DashboardView::Ready)
    }
}

pub fn compose<T>(summary: &PanelState<T>) -> DashboardView {
    if summary.has_data() {
        return DashboardView::Ready;
    }

    match summary.status {
        PanelStatus::Error => DashboardView::Error {
            message: summary
                .error
                .clone()
                .unwrap_or_else(|| "Failed to load market summary".to_string()),
        },
        PanelStatus::Idle | PanelStatus::Loading | PanelStatus::Ready => DashboardView::Loading,
    }
}
