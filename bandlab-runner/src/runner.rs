//! Backtest runner: wires a configured strategy to the replay host.
//!
//! Two entry points:
//! - `run_backtest()`: loads bars per `LoadOptions`, then runs. Used by the CLI.
//! - `run_backtest_on_data()`: takes pre-loaded bars. Used by tests and benches.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span};

use bandlab_core::strategy::{Setup, StrategyError, StrategyState};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
use crate::metrics::PerformanceMetrics;
use crate::replay::{Decision, EquityPoint, ReplayHost};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("strategy failed on {date}: {source}")]
    Strategy {
        date: NaiveDate,
        #[source]
        source: StrategyError,
    },

    #[error("strategy {strategy} did not subscribe '{symbol}' during initialize")]
    NotSubscribed { strategy: String, symbol: String },

    #[error("no bars between {start} and {end}")]
    NoBarsInWindow { start: NaiveDate, end: NaiveDate },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub strategy: String,
    pub symbol: String,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub initial_cash: f64,
    pub final_value: f64,
    pub decisions: Vec<Decision>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_state: StrategyState,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub bar_count: usize,
    pub warmup_bars: usize,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Loading options for a config's symbol and window.
pub fn load_options(config: &BacktestConfig, csv_path: Option<PathBuf>, synthetic: bool) -> LoadOptions {
    LoadOptions {
        start: config.backtest.start_date,
        end: config.backtest.end_date,
        warmup_days: config.backtest.warmup_days,
        csv_path,
        synthetic,
    }
}

/// Load bars for the configured symbol and run the backtest.
pub fn run_backtest(config: &BacktestConfig, opts: &LoadOptions) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_bars(&config.backtest.symbol, opts)?;
    run_backtest_on_data(config, &loaded)
}

/// Run a backtest over pre-loaded bars: no I/O.
///
/// Bars dated before `start_date` only build history; the strategy's
/// `on_data` runs for every bar inside the window, in date order.
pub fn run_backtest_on_data(
    config: &BacktestConfig,
    loaded: &LoadedData,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let bt = &config.backtest;
    let mut strategy = config.build_strategy();
    let span = info_span!("backtest", strategy = strategy.name(), symbol = %bt.symbol);
    let _guard = span.enter();

    let mut setup = Setup::new(config.settings());
    strategy
        .initialize(&mut setup)
        .map_err(|source| RunError::Strategy {
            date: bt.start_date,
            source,
        })?;
    let subscription = setup
        .subscription(&bt.symbol)
        .ok_or_else(|| RunError::NotSubscribed {
            strategy: strategy.name().to_string(),
            symbol: bt.symbol.clone(),
        })?;

    let mut host = ReplayHost::new(
        &bt.symbol,
        &loaded.bars,
        subscription.normalization,
        setup.indicators(),
        bt.initial_cash,
    );

    let mut equity_curve = Vec::new();
    let mut warmup_bars = 0;
    while let Some(date) = host.advance() {
        if date > bt.end_date {
            break;
        }
        if date < bt.start_date {
            warmup_bars += 1;
            continue;
        }
        strategy
            .on_data(&mut host)
            .map_err(|source| RunError::Strategy { date, source })?;
        equity_curve.extend(host.snapshot());
    }

    if equity_curve.is_empty() {
        return Err(RunError::NoBarsInWindow {
            start: bt.start_date,
            end: bt.end_date,
        });
    }

    let final_value = equity_curve.last().map_or(bt.initial_cash, |p| p.equity);
    let decisions = host.into_decisions();
    let metrics = PerformanceMetrics::compute(&equity_curve, &decisions);
    info!(
        bars = equity_curve.len(),
        decisions = decisions.len(),
        final_value,
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id()?,
        strategy: strategy.name().to_string(),
        symbol: bt.symbol.clone(),
        config: config.clone(),
        metrics,
        initial_cash: bt.initial_cash,
        final_value,
        decisions,
        bar_count: equity_curve.len(),
        equity_curve,
        final_state: strategy.state().clone(),
        dataset_hash: loaded.dataset_hash.clone(),
        has_synthetic: loaded.has_synthetic,
        warmup_bars,
    })
}
