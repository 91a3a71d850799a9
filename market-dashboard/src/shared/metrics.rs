//! Derived summary metrics
//!
//! [`compute`] is a pure function of one [`MarketSummary`]. [`MetricsMemo`]
//! keys the result on the summary's `Arc` identity, so it only reruns after a
//! successful summary fetch has replaced the payload.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};

use super::types::{MarketSummary, Stock};

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    pub total_symbols: u64,
    pub formatted_market_cap: String,
    pub formatted_volume: String,
    pub top_gainer: Option<Stock>,
    pub top_loser: Option<Stock>,
    pub most_active: Option<Stock>,
}

/// Heads of the ranked sequences plus formatted totals
pub fn compute(summary: &MarketSummary) -> DerivedMetrics {
    DerivedMetrics {
        total_symbols: summary.total_symbols,
        formatted_market_cap: format_market_cap(summary.total_market_cap),
        formatted_volume: format_volume(summary.total_volume),
        top_gainer: summary.top_gainers.first().cloned(),
        top_loser: summary.top_losers.first().cloned(),
        most_active: summary.most_active.first().cloned(),
    }
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn scaled(value: Decimal, unit: i64) -> Decimal {
    round2(value / Decimal::from(unit))
}

/// `$1.23T`, `$4.56B`, `$7.89M`, or plain dollars below a million
pub fn format_market_cap(value: Decimal) -> String {
    let abs = value.abs();
    if abs >= Decimal::from(1_000_000_000_000i64) {
        format!("${:.2}T", scaled(value, 1_000_000_000_000))
    } else if abs >= Decimal::from(1_000_000_000i64) {
        format!("${:.2}B", scaled(value, 1_000_000_000))
    } else if abs >= Decimal::from(1_000_000i64) {
        format!("${:.2}M", scaled(value, 1_000_000))
    } else {
        format!("${:.2}", round2(value))
    }
}

/// `1.23B`, `4.56M`, `7.89K`, or the raw count below a thousand
pub fn format_volume(volume: u64) -> String {
    let value = Decimal::from(volume);
    if volume >= 1_000_000_000 {
        format!("{:.2}B", scaled(value, 1_000_000_000))
    } else if volume >= 1_000_000 {
        format!("{:.2}M", scaled(value, 1_000_000))
    } else if volume >= 1_000 {
        format!("{:.2}K", scaled(value, 1_000))
    } else {
        volume.to_string()
    }
}

/// Signed percentage with two decimals, e.g. `+5.20%`
pub fn format_change_percent(value: Decimal) -> String {
    let rounded = round2(value);
    if rounded.is_zero() {
        // Avoid rendering `-0.00%`
        return "+0.00%".to_string();
    }

    if rounded.is_sign_negative() {
        format!("{:.2}%", rounded)
    } else {
        format!("+{:.2}%", rounded)
    }
}

pub fn format_price(value: Decimal) -> String {
    format!("${:.2}", round2(value))
}

/// Memoised [`compute`] keyed on summary identity
#[derive(Debug, Default)]
pub struct MetricsMemo {
    last: Option<(Arc<MarketSummary>, Arc<DerivedMetrics>)>,
    computations: u64,
}

impl MetricsMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics for `summary`, recomputed only if it is a different payload
    /// from the one seen last
    pub fn get(&mut self, summary: &Arc<MarketSummary>) -> Arc<DerivedMetrics> {
        if let Some((seen, metrics)) = &self.last {
            if Arc::ptr_eq(seen, summary) {
                return Arc::clone(metrics);
            }
        }

        let metrics = Arc::new(compute(summary));
        self.computations += 1;
        self.last = Some((Arc::clone(summary), Arc::clone(&metrics)));
        metrics
    }

    /// Number of times [`compute`] actually ran
    pub fn computations(&self) -> u64 {
        self.computations
    }
}
