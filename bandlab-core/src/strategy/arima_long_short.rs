//! ARIMA long/short: buy once, then ride the forecast band in the
//! direction of the trend.
//!
//! While invested, every bar re-fits the ARIMA grid on the trailing closes
//! and reads the 80% band at the last forecast step. In an uptrend the
//! upper bound is the take-profit and the lower bound the stop; touching
//! either re-targets +100%. In a downtrend the roles swap and touching
//! either targets −100%. The cooldown is re-armed after every invested
//! evaluation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{NormalizationMode, Resolution, TargetAllocation};
use crate::forecast::{
    assess_trend, perform_arima_forecast, ArimaSearchConfig, ConfidenceBand, ForecastError, Trend,
    DEFAULT_TREND_LOOKBACK,
};

use super::host::{Host, Setup};
use super::state::{ExitReason, StrategyState, DEFAULT_COOLDOWN_DAYS};
use super::{log_portfolio_value, Strategy, StrategyError, DEFAULT_HISTORY_WINDOW};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaLongShortParams {
    pub history_window: usize,
    pub trend_lookback: usize,
    pub search: ArimaSearchConfig,
    pub cooldown_days: u32,
}

impl Default for ArimaLongShortParams {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            trend_lookback: DEFAULT_TREND_LOOKBACK,
            search: ArimaSearchConfig::default(),
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
        }
    }
}

/// Take-profit and stop-loss read off a forecast band for a given trend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendTargets {
    pub take_profit: f64,
    pub stop_loss: f64,
}

impl TrendTargets {
    pub fn new(trend: Trend, band: ConfidenceBand) -> Self {
        match trend {
            Trend::Uptrend => Self {
                take_profit: band.upper,
                stop_loss: band.lower,
            },
            Trend::Downtrend => Self {
                take_profit: band.lower,
                stop_loss: band.upper,
            },
        }
    }

    /// Allocation to target, if `price` has reached either level.
    pub fn signal(&self, trend: Trend, price: f64) -> Option<(TargetAllocation, ExitReason)> {
        match trend {
            Trend::Uptrend if price >= self.take_profit => {
                Some((TargetAllocation::FULL_LONG, ExitReason::TakeProfit))
            }
            Trend::Uptrend if price <= self.stop_loss => {
                Some((TargetAllocation::FULL_LONG, ExitReason::StopLoss))
            }
            Trend::Downtrend if price <= self.take_profit => {
                Some((TargetAllocation::FULL_SHORT, ExitReason::TakeProfit))
            }
            Trend::Downtrend if price >= self.stop_loss => {
                Some((TargetAllocation::FULL_SHORT, ExitReason::StopLoss))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArimaLongShort {
    symbol: String,
    normalization: NormalizationMode,
    params: ArimaLongShortParams,
    state: StrategyState,
}

impl ArimaLongShort {
    pub fn new(symbol: impl Into<String>, params: ArimaLongShortParams) -> Self {
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

    pub fn params(&self) -> &ArimaLongShortParams {
        &self.params
    }

    fn evaluate_position(&mut self, host: &mut dyn Host, price: f64) -> Result<(), StrategyError> {
        let now = host.time();
        let history = host.history(&self.symbol, self.params.history_window);
        if history.len() < self.params.history_window {
            debug!(
                symbol = %self.symbol,
                %now,
                have = history.len(),
                need = self.params.history_window,
                "not enough history for ARIMA, skipping bar"
            );
            return Ok(());
        }

        let trend = assess_trend(&history, self.params.trend_lookback)?;
        let forecast = perform_arima_forecast(&history, &self.params.search)?;
        let (point, band) = forecast.horizon().ok_or_else(|| {
            ForecastError::InvalidParameter("ARIMA forecast has an empty horizon".into())
        })?;
        let targets = TrendTargets::new(trend, band);

        debug!(
            symbol = %self.symbol,
            %now,
            order = %forecast.order,
            forecast = point,
            stderr = forecast.stderr,
            ?trend,
            "ARIMA band"
        );

        if let Some((target, reason)) = targets.signal(trend, price) {
            host.set_holdings(&self.symbol, target, reason.as_str());
            info!(
                symbol = %self.symbol,
                %now,
                price,
                target = target.fraction(),
                take_profit = targets.take_profit,
                stop_loss = targets.stop_loss,
                "{}",
                if target.fraction() > 0.0 { "LONG" } else { "SHORT" }
            );
        }

        self.state.arm_cooldown(now);
        Ok(())
    }
}

impl Strategy for ArimaLongShort {
    fn name(&self) -> &str {
        "arima_long_short"
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
        } else {
            self.evaluate_position(host, price)?;
        }

        log_portfolio_value(self.name(), host);
        Ok(())
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }
}
