//! Refresh scheduler
//!
//! Holds one `(panel, interval, last_fired)` entry per mounted panel and is
//! driven by a single external tick that asks which panels are due. Uses
//! tokio's clock so it can be exercised with a paused runtime.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::panel::PanelId;

#[derive(Debug, Clone, Copy)]
struct ScheduleEntry {
    interval: Option<Duration>,
    last_fired: Instant,
}

#[derive(Debug, Default)]
pub struct RefreshScheduler {
    entries: BTreeMap<PanelId, ScheduleEntry>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `panel` with its cadence.
    ///
    /// The caller performs the immediate mount fetch; it counts as the first
    /// firing. Re-mounting an armed panel keeps its existing schedule.
    pub fn mount(&mut self, panel: PanelId, interval: Option<Duration>, now: Instant) -> bool {
        if self.entries.contains_key(&panel) {
            return false;
        }

        let interval = interval.filter(|interval| !interval.is_zero());
        self.entries.insert(
            panel,
            ScheduleEntry {
                interval,
                last_fired: now,
            },
        );
        debug!(%panel, interval_secs = interval.map(|i| i.as_secs()), "panel mounted");
        true
    }

    /// Disarm `panel`; returns false if it was not mounted
    pub fn teardown(&mut self, panel: PanelId) -> bool {
        self.entries.remove(&panel).is_some()
    }

    pub fn is_mounted(&self, panel: PanelId) -> bool {
        self.entries.contains_key(&panel)
    }

    /// Whether an out-of-band fetch may run for `panel`.
    ///
    /// Never touches the cadence.
    pub fn trigger(&self, panel: PanelId) -> bool {
        self.is_mounted(panel)
    }

    /// Panels whose interval has elapsed at `now`, marking them fired.
    ///
    /// Missed periods are skipped rather than replayed, and the firing
    /// instant stays aligned to the original cadence.
    pub fn due(&mut self, now: Instant) -> Vec<PanelId> {
        let mut due = Vec::new();

        for (panel, entry) in self.entries.iter_mut() {
            let Some(interval) = entry.interval else {
                continue;
            };

            let elapsed = now.saturating_duration_since(entry.last_fired);
            if elapsed < interval {
                continue;
            }

            let lag = elapsed.as_nanos() % interval.as_nanos();
            entry.last_fired = now - Duration::from_nanos(lag as u64);
            due.push(*panel);
        }

        due
    }

    /// Next instant `panel` becomes due, if it has a cadence
    pub fn next_due(&self, panel: PanelId) -> Option<Instant> {
        let entry = self.entries.get(&panel)?;
        entry.interval.map(|interval| entry.last_fired + interval)
    }
}
