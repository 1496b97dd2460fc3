//! Forecasting routines used by the statistical strategies.
//!
//! - `trend`: latest price vs. trailing SMA
//! - `arima`: single ARIMA(p, d, q) fit, forecast and prediction spread
//! - `arima_search`: BIC grid search with per-candidate outcomes
//! - `lstm`: two-layer LSTM one-step forecaster (candle)
//! - `bounds`: z-score confidence bands

pub mod arima;
pub mod arima_search;
pub mod bounds;
pub mod lstm;
pub mod trend;

use thiserror::Error;

pub use arima::{ArimaFitError, ArimaModel, ArimaOrder};
pub use arima_search::{
    find_best_arima, fit_candidates, perform_arima_forecast, ArimaForecast, ArimaSearchConfig,
    ArimaSelection, CandidateFit, SearchGrid,
};
pub use bounds::{population_std, Confidence, ConfidenceBand, PointForecast};
pub use lstm::{LstmConfig, LstmForecaster, PointForecaster};
pub use trend::{assess_trend, Trend, DEFAULT_TREND_LOOKBACK};

/// Errors from the forecasting layer.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("need at least {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("no ARIMA candidate could be fit ({failures} candidates failed)")]
    NoViableModel { failures: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),
}
