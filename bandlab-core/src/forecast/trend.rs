//! Trend classification against a trailing simple moving average.

use serde::{Deserialize, Serialize};

use super::ForecastError;

/// Trailing window used by the ARIMA strategy.
pub const DEFAULT_TREND_LOOKBACK: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Uptrend,
    Downtrend,
}

/// Uptrend iff the latest price is strictly above the mean of the last
/// `lookback` observations (fewer if the series is shorter).
pub fn assess_trend(closes: &[f64], lookback: usize) -> Result<Trend, ForecastError> {
    if lookback == 0 {
        return Err(ForecastError::InvalidParameter(
            "trend lookback must be >= 1".into(),
        ));
    }
    let &current = closes.last().ok_or(ForecastError::EmptySeries)?;
    let window = &closes[closes.len().saturating_sub(lookback)..];
    let sma = window.iter().sum::<f64>() / window.len() as f64;

    Ok(if current > sma {
        Trend::Uptrend
    } else {
        Trend::Downtrend
    })
}
