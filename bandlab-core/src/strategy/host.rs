//! The hosting-platform surface a strategy is written against.

use chrono::NaiveDate;

use crate::domain::{
    AlgorithmSettings, NormalizationMode, Resolution, Subscription, TargetAllocation,
};
use crate::indicators::{IndicatorHandle, IndicatorSpec};

/// Services a host provides during the update phase.
///
/// Market data is daily; `history` returns up to `bars` trailing closes
/// ending with the current bar, oldest first. Indicator queries return
/// `None` until the indicator has warmed up.
pub trait Host {
    fn time(&self) -> NaiveDate;

    /// Whether the current slice carries a bar for `symbol`.
    fn has_data(&self, symbol: &str) -> bool;

    /// Close of the current bar, in the subscription's normalization.
    fn current_price(&self, symbol: &str) -> Option<f64>;

    fn history(&self, symbol: &str, bars: usize) -> Vec<f64>;

    fn indicator(&self, handle: &IndicatorHandle) -> Option<f64>;

    fn is_invested(&self) -> bool;

    /// Target a signed fraction of portfolio value (negative = short).
    fn set_holdings(&mut self, symbol: &str, target: TargetAllocation, tag: &str);

    /// Close every position.
    fn liquidate(&mut self, tag: &str);

    fn portfolio_value(&self) -> f64;
}

/// What a strategy declares during the setup phase.
#[derive(Debug, Clone)]
pub struct Setup {
    settings: AlgorithmSettings,
    subscriptions: Vec<Subscription>,
    indicators: Vec<IndicatorHandle>,
}

impl Setup {
    pub fn new(settings: AlgorithmSettings) -> Self {
        Self {
            settings,
            subscriptions: Vec::new(),
            indicators: Vec::new(),
        }
    }

    pub fn settings(&self) -> &AlgorithmSettings {
        &self.settings
    }

    /// Subscribe an equity. Subscribing the same symbol again replaces
    /// the earlier subscription.
    pub fn add_equity(
        &mut self,
        symbol: &str,
        resolution: Resolution,
        normalization: NormalizationMode,
    ) -> &Subscription {
        let subscription = Subscription {
            symbol: symbol.to_string(),
            resolution,
            normalization,
        };
        let idx = match self.subscriptions.iter().position(|s| s.symbol == symbol) {
            Some(idx) => {
                self.subscriptions[idx] = subscription;
                idx
            }
            None => {
                self.subscriptions.push(subscription);
                self.subscriptions.len() - 1
            }
        };
        &self.subscriptions[idx]
    }

    /// Register an indicator on `symbol` and get the handle to query it by.
    pub fn register_indicator(&mut self, symbol: &str, spec: IndicatorSpec) -> IndicatorHandle {
        let handle = IndicatorHandle::new(symbol, spec);
        if !self.indicators.contains(&handle) {
            self.indicators.push(handle.clone());
        }
        handle
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn subscription(&self, symbol: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.symbol == symbol)
    }

    pub fn indicators(&self) -> &[IndicatorHandle] {
        &self.indicators
    }
}
