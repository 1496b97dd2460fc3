//! BandLab Runner: configuration, bar loading, replay and artifacts.
//!
//! This crate builds on `bandlab-core` to provide:
//! - TOML backtest configs and named presets
//! - Bar loading from CSV with a synthetic fallback for development
//! - A replay host that drives a strategy bar by bar
//! - Performance metrics and JSON/CSV/Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod replay;
pub mod runner;

pub use config::{BacktestConfig, BacktestSection, ConfigError, Preset, StrategyConfig};
pub use data_loader::{load_bars, DataSource, LoadError, LoadOptions, LoadedData};
pub use export::{load_artifacts, save_artifacts, ExportError};
pub use metrics::PerformanceMetrics;
pub use replay::{Decision, DecisionKind, EquityPoint, ReplayHost};
pub use runner::{load_options, run_backtest, run_backtest_on_data, BacktestResult, RunError};
