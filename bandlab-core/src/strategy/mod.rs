//! Strategies: two-phase event handlers written against an abstract host.
//!
//! A strategy declares what it needs in `initialize` (settings, subscription,
//! indicators) and decides once per bar in `on_data`, issuing target
//! allocations through the `Host`. Strategy state is owned by the instance
//! and only mutated from `on_data`.

pub mod arima_long_short;
pub mod host;
pub mod lstm_band;
pub mod percent_band;
pub mod risk_reward;
pub mod state;

use thiserror::Error;
use tracing::info;

use crate::forecast::ForecastError;

pub use arima_long_short::{ArimaLongShort, ArimaLongShortParams};
pub use host::{Host, Setup};
pub use lstm_band::{LstmBand, LstmBandParams};
pub use percent_band::{PercentBand, PercentBandParams};
pub use risk_reward::{RiskReward, RiskRewardParams};
pub use state::{ExitReason, StrategyState, DEFAULT_COOLDOWN_DAYS};

/// Default number of trailing closes fed to the forecasting strategies.
pub const DEFAULT_HISTORY_WINDOW: usize = 90;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("forecast failed: {0}")]
    Forecast(#[from] ForecastError),

    #[error("strategy {0} received data before initialize")]
    NotInitialized(String),
}

/// A single-security strategy driven by a host.
pub trait Strategy: Send {
    /// Stable identifier, e.g. "percent_band".
    fn name(&self) -> &str;

    /// The traded symbol.
    fn symbol(&self) -> &str;

    /// Setup phase: subscribe data and register indicators.
    fn initialize(&mut self, setup: &mut Setup) -> Result<(), StrategyError>;

    /// Update phase, called once per bar in date order.
    fn on_data(&mut self, host: &mut dyn Host) -> Result<(), StrategyError>;

    fn state(&self) -> &StrategyState;
}

/// Every variant reports the portfolio value after each bar.
pub(crate) fn log_portfolio_value(strategy: &str, host: &dyn Host) {
    info!(
        strategy,
        date = %host.time(),
        value = host.portfolio_value(),
        "portfolio value"
    );
}
