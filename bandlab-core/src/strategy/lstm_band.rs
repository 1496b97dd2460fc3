//! LSTM band: buy and hold while price stays inside the LSTM forecast
//! band; liquidate and cool down when it leaves.
//!
//! The band is asymmetric: the lower target is the 95% lower bound and the
//! upper target the 80% upper bound.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{NormalizationMode, Resolution, TargetAllocation};
use crate::forecast::{ForecastError, LstmConfig, LstmForecaster, PointForecast, PointForecaster};

use super::host::{Host, Setup};
use super::state::{ExitReason, StrategyState, DEFAULT_COOLDOWN_DAYS};
use super::{log_portfolio_value, Strategy, StrategyError, DEFAULT_HISTORY_WINDOW};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmBandParams {
    pub history_window: usize,
    pub lstm: LstmConfig,
    pub cooldown_days: u32,
}

impl Default for LstmBandParams {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            lstm: LstmConfig::default(),
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
        }
    }
}

/// Lower 95% and upper 80% bounds of a forecast.
pub fn exit_targets(forecast: &PointForecast) -> (f64, f64) {
    (forecast.band_95.lower, forecast.band_80.upper)
}

pub struct LstmBand {
    symbol: String,
    normalization: NormalizationMode,
    params: LstmBandParams,
    state: StrategyState,
    forecaster: Box<dyn PointForecaster>,
}

impl LstmBand {
    pub fn new(symbol: impl Into<String>, params: LstmBandParams) -> Self {
        let forecaster = Box::new(LstmForecaster::new(params.lstm.clone()));
        Self::with_forecaster(symbol, params, forecaster)
    }

    /// Use any point forecaster in place of the LSTM.
    pub fn with_forecaster(
        symbol: impl Into<String>,
        params: LstmBandParams,
        forecaster: Box<dyn PointForecaster>,
    ) -> Self {
        let state = StrategyState::new(params.cooldown_days);
        Self {
            symbol: symbol.into(),
            normalization: NormalizationMode::Raw,
            params,
            state,
            forecaster,
        }
    }

    pub fn with_normalization(mut self, normalization: NormalizationMode) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn params(&self) -> &LstmBandParams {
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
                "not enough history for LSTM, skipping bar"
            );
            return Ok(());
        }

        let forecast = match self.forecaster.forecast(&history) {
            Ok(forecast) => forecast,
            Err(ForecastError::InsufficientHistory { needed, got }) => {
                debug!(symbol = %self.symbol, %now, needed, got, "forecaster needs more history, skipping bar");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let (lower, upper) = exit_targets(&forecast);

        let reason = if price < lower {
            ExitReason::BelowBand
        } else if price > upper {
            ExitReason::AboveBand
        } else {
            debug!(symbol = %self.symbol, %now, price, lower, upper, "inside band");
            return Ok(());
        };

        host.liquidate(reason.as_str());
        self.state.record_exit(now);
        info!(
            symbol = %self.symbol,
            %now,
            price,
            forecast = forecast.forecast,
            lower,
            upper,
            "SELL"
        );
        Ok(())
    }
}

impl Strategy for LstmBand {
    fn name(&self) -> &str {
        "lstm_band"
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
