//! End-to-end runs of the shipped presets on synthetic data.

use bandlab_runner::{
    load_options, run_backtest, BacktestConfig, DecisionKind, Preset, RunError, StrategyConfig,
};
use chrono::NaiveDate;

fn synthetic(config: &BacktestConfig) -> bandlab_runner::LoadOptions {
    load_options(config, None, true)
}

#[test]
fn spy_band_preset_runs_and_tags_synthetic() {
    let config = Preset::SpyBand.config();
    let result = run_backtest(&config, &synthetic(&config)).unwrap();

    assert!(result.has_synthetic);
    assert_eq!(result.strategy, "percent_band");
    assert!(result.warmup_bars > 0);
    assert!(result.bar_count > 100);
    // First in-window bar is an entry.
    let first = &result.decisions[0];
    assert_eq!(first.kind, DecisionKind::SetHoldings);
    assert_eq!(first.target, 1.0);
    assert!(first.date >= config.backtest.start_date);
    assert!(result
        .equity_curve
        .iter()
        .all(|p| p.date >= config.backtest.start_date && p.date <= config.backtest.end_date));
}

#[test]
fn exits_respect_cooldown() {
    let config = Preset::SpyBandWide.config();
    let result = run_backtest(&config, &synthetic(&config)).unwrap();

    let mut blocked_until: Option<NaiveDate> = None;
    for d in &result.decisions {
        match d.kind {
            DecisionKind::Liquidate => {
                blocked_until = d.date.checked_add_days(chrono::Days::new(31));
            }
            DecisionKind::SetHoldings => {
                if let Some(until) = blocked_until {
                    assert!(d.date >= until, "entry on {} before {}", d.date, until);
                }
            }
        }
    }
}

#[test]
fn arima_preset_runs_on_a_short_window() {
    let mut config = Preset::NvdaArima.config();
    config.backtest.start_date = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
    config.backtest.end_date = NaiveDate::from_ymd_opt(2022, 6, 30).unwrap();
    let result = run_backtest(&config, &synthetic(&config)).unwrap();

    assert_eq!(result.strategy, "arima_long_short");
    assert!(result.final_value > 0.0);
    // Every decision after the initial entry is a full long or full short.
    assert!(result
        .decisions
        .iter()
        .all(|d| d.target == 1.0 || d.target == -1.0));
}

#[test]
fn runs_are_reproducible() {
    let config = Preset::SpyRiskReward.config();
    let opts = synthetic(&config);
    let a = run_backtest(&config, &opts).unwrap();
    let b = run_backtest(&config, &opts).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.dataset_hash, b.dataset_hash);
    assert_eq!(a.decisions, b.decisions);
    assert_eq!(a.metrics, b.metrics);
}

#[test]
fn missing_data_source_is_reported() {
    let config = Preset::SpyBand.config();
    let err = run_backtest(&config, &load_options(&config, None, false)).unwrap_err();
    assert!(matches!(err, RunError::Data(_)));
}

#[test]
fn invalid_config_is_rejected_before_loading() {
    let mut config = Preset::SpyBand.config();
    if let StrategyConfig::PercentBand(p) = &mut config.strategy {
        p.stop_loss_pct = 1.5;
    }
    let err = run_backtest(&config, &synthetic(&config)).unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
}
