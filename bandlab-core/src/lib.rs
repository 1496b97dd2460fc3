//! BandLab Core: domain types, indicators, forecasting and strategies.
//!
//! This crate contains everything a strategy needs, independent of any host:
//! - Domain types (bars, backtest settings, target allocations)
//! - Indicators (SMA, EMA, RSI, ATR) with warm-up handling
//! - Forecasting: trend classification, ARIMA order search, LSTM forecaster
//! - The `Host` trait strategies are written against
//! - Strategy state machine and the four shipped strategy variants

pub mod domain;
pub mod forecast;
pub mod indicators;
pub mod strategy;
