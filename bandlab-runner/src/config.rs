//! Serializable backtest configuration and named presets.
//!
//! A config file is TOML with two tables:
//!
//! ```toml
//! [backtest]
//! symbol = "SPY"
//! start_date = "2023-01-01"
//! end_date = "2023-07-01"
//! initial_cash = 2000.0
//!
//! [strategy]
//! type = "percent_band"
//! take_profit_pct = 0.10
//! stop_loss_pct = 0.05
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandlab_core::domain::{AccountType, AlgorithmSettings, Brokerage, NormalizationMode};
use bandlab_core::strategy::{
    ArimaLongShort, ArimaLongShortParams, LstmBand, LstmBandParams, PercentBand,
    PercentBandParams, RiskReward, RiskRewardParams, Strategy,
};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Calendar days of bars loaded before the start date to warm up history
/// and indicators.
pub const DEFAULT_WARMUP_DAYS: u32 = 180;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown preset '{0}' (see `bandlab presets`)")]
    UnknownPreset(String),
}

/// Full backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategyConfig,
}

/// The `[backtest]` table: instrument, window, cash and account model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestSection {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    /// Defaults to the traded symbol.
    #[serde(default)]
    pub benchmark: Option<String>,
    #[serde(default)]
    pub brokerage: Brokerage,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub normalization: NormalizationMode,
    #[serde(default = "default_warmup_days")]
    pub warmup_days: u32,
}

fn default_initial_cash() -> f64 {
    2000.0
}

fn default_warmup_days() -> u32 {
    DEFAULT_WARMUP_DAYS
}

/// The `[strategy]` table, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    PercentBand(PercentBandParams),
    RiskReward(RiskRewardParams),
    ArimaLongShort(ArimaLongShortParams),
    LstmBand(LstmBandParams),
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::PercentBand(_) => "percent_band",
            StrategyConfig::RiskReward(_) => "risk_reward",
            StrategyConfig::ArimaLongShort(_) => "arima_long_short",
            StrategyConfig::LstmBand(_) => "lstm_band",
        }
    }

    /// Instantiate the strategy for `symbol`.
    pub fn build(&self, symbol: &str, normalization: NormalizationMode) -> Box<dyn Strategy> {
        match self {
            StrategyConfig::PercentBand(p) => {
                Box::new(PercentBand::new(symbol, p.clone()).with_normalization(normalization))
            }
            StrategyConfig::RiskReward(p) => {
                Box::new(RiskReward::new(symbol, p.clone()).with_normalization(normalization))
            }
            StrategyConfig::ArimaLongShort(p) => {
                Box::new(ArimaLongShort::new(symbol, p.clone()).with_normalization(normalization))
            }
            StrategyConfig::LstmBand(p) => {
                Box::new(LstmBand::new(symbol, p.clone()).with_normalization(normalization))
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyConfig::PercentBand(p) => {
                if !(p.take_profit_pct > 0.0 && p.take_profit_pct.is_finite()) {
                    return invalid("take_profit_pct must be positive");
                }
                if !(p.stop_loss_pct > 0.0 && p.stop_loss_pct < 1.0) {
                    return invalid("stop_loss_pct must be in (0, 1)");
                }
            }
            StrategyConfig::RiskReward(p) => {
                if p.sma_period == 0 || p.atr_period == 0 || p.rsi_period == 0 {
                    return invalid("indicator periods must be >= 1");
                }
                if !(p.stop_atr_multiple > 0.0 && p.take_atr_multiple > 0.0) {
                    return invalid("ATR multiples must be positive");
                }
            }
            StrategyConfig::ArimaLongShort(p) => {
                if p.history_window == 0 || p.trend_lookback == 0 {
                    return invalid("history_window and trend_lookback must be >= 1");
                }
                if p.search.steps == 0 {
                    return invalid("search.steps must be >= 1");
                }
            }
            StrategyConfig::LstmBand(p) => {
                p.lstm
                    .validate()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                if p.history_window < p.lstm.min_history() {
                    return invalid(&format!(
                        "history_window {} is shorter than the {} closes the LSTM needs",
                        p.history_window,
                        p.lstm.min_history()
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.to_string()))
}

impl BacktestConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.symbol.trim().is_empty() {
            return invalid("symbol must not be empty");
        }
        if bt.start_date > bt.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} is after end_date {}",
                bt.start_date, bt.end_date
            )));
        }
        if !(bt.initial_cash > 0.0 && bt.initial_cash.is_finite()) {
            return invalid("initial_cash must be positive");
        }
        self.strategy.validate()
    }

    pub fn benchmark(&self) -> &str {
        self.backtest
            .benchmark
            .as_deref()
            .unwrap_or(&self.backtest.symbol)
    }

    /// Settings handed to the strategy during setup.
    pub fn settings(&self) -> AlgorithmSettings {
        AlgorithmSettings {
            start_date: self.backtest.start_date,
            end_date: self.backtest.end_date,
            cash: self.backtest.initial_cash,
            benchmark: self.benchmark().to_string(),
            brokerage: self.backtest.brokerage,
            account_type: self.backtest.account_type,
        }
    }

    pub fn build_strategy(&self) -> Box<dyn Strategy> {
        self.strategy
            .build(&self.backtest.symbol, self.backtest.normalization)
    }

    /// Deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share the same RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Named configurations reproducing the shipped strategy scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// SPY, +10% / −5% band, H1 2023, $2,000.
    SpyBand,
    /// SPY, +10% / −10% band, Q4 2020, $100,000.
    SpyBandWide,
    /// SPY, ATR/RSI risk-reward, Q2 2023, $2,000.
    SpyRiskReward,
    /// NVDA, ARIMA long/short, 2022 – mid 2023, $2,000, SPY benchmark.
    NvdaArima,
    /// SPY, LSTM band, H1 2023, $2,000.
    SpyLstm,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::SpyBand,
        Preset::SpyBandWide,
        Preset::SpyRiskReward,
        Preset::NvdaArima,
        Preset::SpyLstm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::SpyBand => "spy_band",
            Preset::SpyBandWide => "spy_band_wide",
            Preset::SpyRiskReward => "spy_risk_reward",
            Preset::NvdaArima => "nvda_arima",
            Preset::SpyLstm => "spy_lstm",
        }
    }

    pub fn config(self) -> BacktestConfig {
        let (symbol, start, end, cash, strategy) = match self {
            Preset::SpyBand => (
                "SPY",
                (2023, 1, 1),
                (2023, 7, 1),
                2000.0,
                StrategyConfig::PercentBand(PercentBandParams::default()),
            ),
            Preset::SpyBandWide => (
                "SPY",
                (2020, 9, 23),
                (2021, 1, 1),
                100_000.0,
                StrategyConfig::PercentBand(PercentBandParams::wide()),
            ),
            Preset::SpyRiskReward => (
                "SPY",
                (2023, 4, 1),
                (2023, 7, 1),
                2000.0,
                StrategyConfig::RiskReward(RiskRewardParams::default()),
            ),
            Preset::NvdaArima => (
                "NVDA",
                (2022, 1, 1),
                (2023, 7, 1),
                2000.0,
                StrategyConfig::ArimaLongShort(ArimaLongShortParams::default()),
            ),
            Preset::SpyLstm => (
                "SPY",
                (2023, 1, 1),
                (2023, 7, 1),
                2000.0,
                StrategyConfig::LstmBand(LstmBandParams::default()),
            ),
        };

        BacktestConfig {
            backtest: BacktestSection {
                symbol: symbol.to_string(),
                start_date: ymd(start),
                end_date: ymd(end),
                initial_cash: cash,
                benchmark: Some("SPY".to_string()),
                brokerage: Brokerage::InteractiveBrokers,
                account_type: AccountType::Margin,
                normalization: NormalizationMode::Raw,
                warmup_days: DEFAULT_WARMUP_DAYS,
            },
            strategy,
        }
    }
}

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAND_TOML: &str = r#"
[backtest]
symbol = "SPY"
start_date = "2023-01-01"
end_date = "2023-07-01"
initial_cash = 2000.0

[strategy]
type = "percent_band"
stop_loss_pct = 0.10
"#;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let config = BacktestConfig::from_toml(BAND_TOML).unwrap();
        assert_eq!(config.backtest.symbol, "SPY");
        assert_eq!(config.backtest.brokerage, Brokerage::InteractiveBrokers);
        assert_eq!(config.backtest.warmup_days, DEFAULT_WARMUP_DAYS);
        assert_eq!(config.benchmark(), "SPY");
        match &config.strategy {
            StrategyConfig::PercentBand(p) => {
                assert_eq!(p.take_profit_pct, 0.10);
                assert_eq!(p.stop_loss_pct, 0.10);
                assert_eq!(p.cooldown_days, 31);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn parses_nested_arima_search() {
        let text = r#"
[backtest]
symbol = "NVDA"
start_date = "2022-01-01"
end_date = "2023-07-01"
benchmark = "SPY"

[strategy]
type = "arima_long_short"
history_window = 60

[strategy.search.grid]
max_p = 1
"#;
        let config = BacktestConfig::from_toml(text).unwrap();
        let StrategyConfig::ArimaLongShort(p) = &config.strategy else {
            panic!("expected arima");
        };
        assert_eq!(p.history_window, 60);
        assert_eq!(p.search.grid.max_p, 1);
        assert_eq!(p.search.grid.max_q, 2);
        assert_eq!(p.search.steps, 4);
        assert_eq!(config.benchmark(), "SPY");
    }

    #[test]
    fn rejects_inverted_dates() {
        let text = BAND_TOML.replace("2023-01-01", "2024-01-01");
        let err = BacktestConfig::from_toml(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_strategy_type() {
        let text = BAND_TOML.replace("percent_band", "moon_shot");
        assert!(matches!(
            BacktestConfig::from_toml(&text).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn rejects_lstm_window_shorter_than_model_needs() {
        let mut config = Preset::SpyLstm.config();
        if let StrategyConfig::LstmBand(p) = &mut config.strategy {
            p.history_window = 35;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn presets_round_trip_through_toml() {
        for preset in Preset::ALL {
            let config = preset.config();
            config.validate().unwrap();
            let text = config.to_toml().unwrap();
            let back = BacktestConfig::from_toml(&text).unwrap();
            assert_eq!(config, back, "preset {preset}");
        }
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("nvda_arima".parse::<Preset>().unwrap(), Preset::NvdaArima);
        assert!(matches!(
            "nope".parse::<Preset>().unwrap_err(),
            ConfigError::UnknownPreset(_)
        ));
    }

    #[test]
    fn run_id_changes_with_params() {
        let a = Preset::SpyBand.config();
        let b = Preset::SpyBandWide.config();
        assert_eq!(a.run_id().unwrap(), a.run_id().unwrap());
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }

    #[test]
    fn build_uses_configured_strategy() {
        let strategy = Preset::NvdaArima.config().build_strategy();
        assert_eq!(strategy.name(), "arima_long_short");
        assert_eq!(strategy.symbol(), "NVDA");
    }
}
