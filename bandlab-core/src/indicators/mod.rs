//! Managed indicators: SMA, EMA, RSI and ATR.
//!
//! A strategy registers an [`IndicatorSpec`] during setup; the host computes
//! the series and answers "current value or not ready" on every bar. Series
//! are computed over the full bar history once and then read by index, so the
//! value at bar t may only depend on bars `0..=t`.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

pub use atr::Atr;
pub use ema::Ema;
pub use rsi::Rsi;
pub use sma::Sma;

/// Indicator: bar history in, numeric series of the same length out.
///
/// The first `lookback()` values are `f64::NAN` (warm-up).
pub trait Indicator: Send + Sync {
    /// Human-readable name, e.g. "sma_14".
    fn name(&self) -> &str;

    /// Number of bars consumed before the first valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Serializable description of an indicator a strategy wants the host to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "period", rename_all = "snake_case")]
pub enum IndicatorSpec {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
}

impl IndicatorSpec {
    pub fn build(self) -> Box<dyn Indicator> {
        match self {
            IndicatorSpec::Sma(p) => Box::new(Sma::new(p)),
            IndicatorSpec::Ema(p) => Box::new(Ema::new(p)),
            IndicatorSpec::Rsi(p) => Box::new(Rsi::new(p)),
            IndicatorSpec::Atr(p) => Box::new(Atr::new(p)),
        }
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorSpec::Sma(p) => write!(f, "sma_{p}"),
            IndicatorSpec::Ema(p) => write!(f, "ema_{p}"),
            IndicatorSpec::Rsi(p) => write!(f, "rsi_{p}"),
            IndicatorSpec::Atr(p) => write!(f, "atr_{p}"),
        }
    }
}

/// Handle returned at registration time and used to query the current value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorHandle {
    pub symbol: String,
    pub spec: IndicatorSpec,
}

impl IndicatorHandle {
    pub fn new(symbol: impl Into<String>, spec: IndicatorSpec) -> Self {
        Self {
            symbol: symbol.into(),
            spec,
        }
    }
}

/// Precomputed indicator series, keyed by handle.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<IndicatorHandle, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: IndicatorHandle, values: Vec<f64>) {
        self.series.insert(handle, values);
    }

    /// Value at `bar_index`, or `None` when unknown, out of range, or still warming up.
    pub fn ready_value(&self, handle: &IndicatorHandle, bar_index: usize) -> Option<f64> {
        self.series
            .get(handle)
            .and_then(|v| v.get(bar_index).copied())
            .filter(|v| v.is_finite())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = previous close, high/low = max/min(open, close) ± 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "SPY".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
                adj_close: close,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, epsilon={epsilon}"
    );
}
