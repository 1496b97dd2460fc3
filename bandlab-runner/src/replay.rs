//! Replay host: feeds historical bars to a strategy one day at a time.
//!
//! The host answers data and indicator queries from a precomputed bar
//! series, records every allocation instruction as a [`Decision`], and marks
//! a notional portfolio to market by compounding each bar's return at the
//! allocation held over that bar. There are no orders, fills or fees.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use bandlab_core::domain::{Bar, NormalizationMode, TargetAllocation};
use bandlab_core::indicators::{IndicatorHandle, IndicatorValues};
use bandlab_core::strategy::Host;

/// Kind of instruction a strategy issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    SetHoldings,
    Liquidate,
}

/// One recorded allocation instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub date: NaiveDate,
    pub symbol: String,
    pub kind: DecisionKind,
    /// Target fraction after the instruction (0 for liquidate).
    pub target: f64,
    /// Close the decision was taken at.
    pub price: Option<f64>,
    pub portfolio_value: f64,
    pub tag: String,
}

/// End-of-day mark of the notional portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
    /// Allocation held into the next bar.
    pub allocation: f64,
    pub equity: f64,
}

/// Single-symbol replay host.
#[derive(Debug)]
pub struct ReplayHost {
    symbol: String,
    normalization: NormalizationMode,
    bars: Vec<Bar>,
    indicators: IndicatorValues,
    position: Option<usize>,
    allocation: f64,
    equity: f64,
    last_price: Option<f64>,
    decisions: Vec<Decision>,
}

impl ReplayHost {
    /// Build a host over `bars` (date ordered) for a subscription to `symbol`.
    ///
    /// Bars are normalized once up front, and every registered indicator on
    /// `symbol` is computed over the normalized series.
    pub fn new(
        symbol: &str,
        bars: &[Bar],
        normalization: NormalizationMode,
        handles: &[IndicatorHandle],
        initial_cash: f64,
    ) -> Self {
        let bars: Vec<Bar> = bars.iter().map(|b| b.normalized(normalization)).collect();

        let mut indicators = IndicatorValues::new();
        for handle in handles {
            if handle.symbol != symbol {
                warn!(
                    indicator = %handle.spec,
                    symbol = %handle.symbol,
                    "indicator registered on an unsubscribed symbol, it will never be ready"
                );
                continue;
            }
            let series = handle.spec.build().compute(&bars);
            indicators.insert(handle.clone(), series);
        }

        Self {
            symbol: symbol.to_string(),
            normalization,
            bars,
            indicators,
            position: None,
            allocation: 0.0,
            equity: initial_cash,
            last_price: None,
            decisions: Vec::new(),
        }
    }

    pub fn normalization(&self) -> NormalizationMode {
        self.normalization
    }

    /// Move to the next bar and mark the portfolio to its close.
    ///
    /// Returns the new bar's date, or `None` once the series is exhausted.
    pub fn advance(&mut self) -> Option<NaiveDate> {
        let next = self.position.map_or(0, |i| i + 1);
        let bar = self.bars.get(next)?;
        self.position = Some(next);

        if !bar.is_void() {
            if let Some(prev) = self.last_price {
                let bar_return = bar.close / prev - 1.0;
                self.equity = (self.equity * (1.0 + self.allocation * bar_return)).max(0.0);
            }
            self.last_price = Some(bar.close);
        }
        Some(bar.date)
    }

    fn current_bar(&self) -> Option<&Bar> {
        self.position.and_then(|i| self.bars.get(i))
    }

    pub fn allocation(&self) -> f64 {
        self.allocation
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn into_decisions(self) -> Vec<Decision> {
        self.decisions
    }

    /// Mark of the current bar, taken after the strategy has run.
    pub fn snapshot(&self) -> Option<EquityPoint> {
        let bar = self.current_bar()?;
        Some(EquityPoint {
            date: bar.date,
            close: self.current_price(&self.symbol),
            allocation: self.allocation,
            equity: self.equity,
        })
    }

    fn record(&mut self, kind: DecisionKind, target: f64, tag: &str) {
        let date = self.time();
        let price = self.current_price(&self.symbol);
        trace!(%date, ?kind, target, tag, "decision");
        self.decisions.push(Decision {
            date,
            symbol: self.symbol.clone(),
            kind,
            target,
            price,
            portfolio_value: self.equity,
            tag: tag.to_string(),
        });
    }
}

impl Host for ReplayHost {
    fn time(&self) -> NaiveDate {
        self.current_bar().map_or(NaiveDate::MIN, |b| b.date)
    }

    fn has_data(&self, symbol: &str) -> bool {
        symbol == self.symbol && self.current_bar().is_some_and(|b| !b.is_void())
    }

    fn current_price(&self, symbol: &str) -> Option<f64> {
        if !self.has_data(symbol) {
            return None;
        }
        self.current_bar().map(|b| b.close)
    }

    fn history(&self, symbol: &str, bars: usize) -> Vec<f64> {
        let Some(end) = self.position else {
            return Vec::new();
        };
        if symbol != self.symbol {
            return Vec::new();
        }
        let closes: Vec<f64> = self.bars[..=end]
            .iter()
            .filter(|b| !b.is_void())
            .map(|b| b.close)
            .collect();
        let skip = closes.len().saturating_sub(bars);
        closes[skip..].to_vec()
    }

    fn indicator(&self, handle: &IndicatorHandle) -> Option<f64> {
        self.indicators.ready_value(handle, self.position?)
    }

    fn is_invested(&self) -> bool {
        self.allocation != 0.0
    }

    fn set_holdings(&mut self, symbol: &str, target: TargetAllocation, tag: &str) {
        if symbol != self.symbol {
            warn!(symbol, subscribed = %self.symbol, "set_holdings for unsubscribed symbol ignored");
            return;
        }
        self.allocation = target.fraction();
        self.record(DecisionKind::SetHoldings, self.allocation, tag);
    }

    fn liquidate(&mut self, tag: &str) {
        self.allocation = 0.0;
        self.record(DecisionKind::Liquidate, 0.0, tag);
    }

    fn portfolio_value(&self) -> f64 {
        self.equity
    }
}
