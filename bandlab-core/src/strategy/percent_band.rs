//! Percent band: buy and hold until price leaves a fixed band around entry.
//!
//! FLAT and cooldown elapsed → 100% long at the close. INVESTED and the
//! close is strictly above `entry · (1 + take_profit_pct)` or strictly below
//! `entry · (1 − stop_loss_pct)` → liquidate and stay out for the cooldown.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{NormalizationMode, Resolution, TargetAllocation};

use super::host::{Host, Setup};
use super::state::{ExitReason, StrategyState, DEFAULT_COOLDOWN_DAYS};
use super::{log_portfolio_value, Strategy, StrategyError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentBandParams {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub cooldown_days: u32,
}

impl Default for PercentBandParams {
    /// +10% / −5%.
    fn default() -> Self {
        Self {
            take_profit_pct: 0.10,
            stop_loss_pct: 0.05,
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
        }
    }
}

impl PercentBandParams {
    /// +10% / −10%.
    pub fn wide() -> Self {
        Self {
            stop_loss_pct: 0.10,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PercentBand {
    symbol: String,
    normalization: NormalizationMode,
    params: PercentBandParams,
    state: StrategyState,
}

impl PercentBand {
    pub fn new(symbol: impl Into<String>, params: PercentBandParams) -> Self {
        let state = StrategyState::new(params.cooldown_days);
        Self {
            symbol: symbol.into(),
            normalization: NormalizationMode::Raw,
            params,
            state,
        }
    }

    pub fn with_normalization(mut self, normalization: NormalizationMode) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn params(&self) -> &PercentBandParams {
        &self.params
    }

    /// Exit check for an open position entered at `entry`.
    pub fn exit_reason(&self, entry: f64, price: f64) -> Option<ExitReason> {
        if entry * (1.0 + self.params.take_profit_pct) < price {
            Some(ExitReason::TakeProfit)
        } else if entry * (1.0 - self.params.stop_loss_pct) > price {
            Some(ExitReason::StopLoss)
        } else {
            None
        }
    }
}

impl Strategy for PercentBand {
    fn name(&self) -> &str {
        "percent_band"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn initialize(&mut self, setup: &mut Setup) -> Result<(), StrategyError> {
        setup.add_equity(&self.symbol, Resolution::Daily, self.normalization);
        self.state.reset(setup.settings().start_date);
        Ok(())
    }

    fn on_data(&mut self, host: &mut dyn Host) -> Result<(), StrategyError> {
        if !host.has_data(&self.symbol) {
            return Ok(());
        }
        let Some(price) = host.current_price(&self.symbol) else {
            return Ok(());
        };
        let now = host.time();

        if !host.is_invested() {
            if self.state.can_enter(now) {
                host.set_holdings(&self.symbol, TargetAllocation::FULL_LONG, "entry");
                info!(symbol = %self.symbol, %now, price, "BUY");
                self.state.record_entry(price);
            }
        } else if let Some(entry) = self.state.entry_price() {
            if let Some(reason) = self.exit_reason(entry, price) {
                host.liquidate(reason.as_str());
                info!(symbol = %self.symbol, %now, price, entry, %reason, "SELL");
                self.state.record_exit(now);
            }
        }

        log_portfolio_value(self.name(), host);
        Ok(())
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }
}
