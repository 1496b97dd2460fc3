//! Bar: the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::NormalizationMode;

/// Daily OHLCV bar for a single symbol.
///
/// OHLC are raw exchange prices. `adj_close` carries the split/dividend
/// adjusted close and is only read when a subscription asks for adjusted
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

impl Bar {
    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.adj_close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Close price as seen under the given normalization mode.
    pub fn price(&self, mode: NormalizationMode) -> f64 {
        match mode {
            NormalizationMode::Raw => self.close,
            NormalizationMode::Adjusted => self.adj_close,
        }
    }

    /// Copy of the bar with OHLC expressed in the given normalization.
    ///
    /// Adjusted bars scale open, high and low by `adj_close / close` so that
    /// range-based indicators see the same price series as the strategy.
    pub fn normalized(&self, mode: NormalizationMode) -> Bar {
        match mode {
            NormalizationMode::Raw => self.clone(),
            NormalizationMode::Adjusted => {
                let factor = if self.close > 0.0 {
                    self.adj_close / self.close
                } else {
                    1.0
                };
                Bar {
                    open: self.open * factor,
                    high: self.high * factor,
                    low: self.low * factor,
                    close: self.adj_close,
                    ..self.clone()
                }
            }
        }
    }
}
