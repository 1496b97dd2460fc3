//! BandLab CLI: run backtests, list presets, inspect forecasts.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file or named preset
//! - `presets`: list the shipped presets, or print one as TOML
//! - `forecast`: run the ARIMA, LSTM or trend routine on the latest window

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};

use bandlab_core::forecast::{
    assess_trend, fit_candidates, perform_arima_forecast, ArimaSearchConfig, CandidateFit,
    LstmConfig, LstmForecaster, PointForecaster, DEFAULT_TREND_LOOKBACK,
};
use bandlab_core::strategy::DEFAULT_HISTORY_WINDOW;
use bandlab_runner::{
    load_bars, load_options, run_backtest, save_artifacts, BacktestConfig, BacktestResult,
    LoadOptions, Preset,
};

#[derive(Parser)]
#[command(name = "bandlab", about = "BandLab: single-security band and forecast strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or named preset.
    Run {
        /// Path to a TOML config file.
        #[arg(long, conflicts_with = "preset")]
        config: Option<PathBuf>,

        /// Named preset (see `bandlab presets`).
        #[arg(long)]
        preset: Option<String>,

        /// Bar CSV (date,open,high,low,close,volume[,adj_close]).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Use deterministic synthetic bars when no CSV is given.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Override the traded symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Override the start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Override the end date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// List presets, or print one as a TOML config.
    Presets {
        /// Preset to print.
        name: Option<String>,
    },
    /// Forecast from the trailing window of closes ending at `--end`.
    Forecast {
        #[arg(value_enum)]
        model: ForecastModel,

        #[arg(long, default_value = "SPY")]
        symbol: String,

        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Last date of the window (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,

        /// Number of trailing closes.
        #[arg(long, default_value_t = DEFAULT_HISTORY_WINDOW)]
        window: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ForecastModel {
    Arima,
    Lstm,
    Trend,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            preset,
            data,
            synthetic,
            symbol,
            start,
            end,
            output_dir,
        } => {
            let mut config = match (config, preset) {
                (Some(path), None) => BacktestConfig::from_file(&path)?,
                (None, Some(name)) => name.parse::<Preset>()?.config(),
                _ => bail!("one of --config or --preset is required"),
            };
            if let Some(symbol) = symbol {
                config.backtest.symbol = symbol;
            }
            if let Some(start) = start {
                config.backtest.start_date = start;
            }
            if let Some(end) = end {
                config.backtest.end_date = end;
            }
            config.validate()?;

            let opts = load_options(&config, data, synthetic);
            let result = run_backtest(&config, &opts)?;
            print_summary(&result);

            let run_dir = save_artifacts(&result, &output_dir)?;
            println!("Artifacts saved to: {}", run_dir.display());
            Ok(())
        }
        Commands::Presets { name } => match name {
            Some(name) => {
                print!("{}", name.parse::<Preset>()?.config().to_toml()?);
                Ok(())
            }
            None => {
                for preset in Preset::ALL {
                    let c = preset.config();
                    println!(
                        "{:<16} {:<18} {:<5} {} to {}  ${:.0}",
                        preset.name(),
                        c.strategy.name(),
                        c.backtest.symbol,
                        c.backtest.start_date,
                        c.backtest.end_date,
                        c.backtest.initial_cash
                    );
                }
                Ok(())
            }
        },
        Commands::Forecast {
            model,
            symbol,
            data,
            synthetic,
            end,
            window,
        } => run_forecast(model, &symbol, data, synthetic, end, window),
    }
}

fn run_forecast(
    model: ForecastModel,
    symbol: &str,
    data: Option<PathBuf>,
    synthetic: bool,
    end: NaiveDate,
    window: usize,
) -> Result<()> {
    // Trading days are at most 5/7 of calendar days; load generously.
    let calendar_days = u32::try_from(window * 2 + 14).context("window too large")?;
    let opts = LoadOptions {
        start: end.checked_sub_days(Days::new(7)).unwrap_or(end),
        end,
        warmup_days: calendar_days,
        csv_path: data,
        synthetic,
    };
    let loaded = load_bars(symbol, &opts)?;
    let closes: Vec<f64> = loaded.bars.iter().map(|b| b.close).collect();
    let closes = &closes[closes.len().saturating_sub(window)..];
    let last_date = loaded.bars.last().map(|b| b.date).unwrap_or(end);
    println!(
        "{symbol}: {} closes ending {last_date}, last close {:.2}",
        closes.len(),
        closes.last().copied().unwrap_or(f64::NAN)
    );

    match model {
        ForecastModel::Trend => {
            let trend = assess_trend(closes, DEFAULT_TREND_LOOKBACK)?;
            println!("trend ({DEFAULT_TREND_LOOKBACK}-bar SMA): {trend:?}");
        }
        ForecastModel::Arima => {
            let config = ArimaSearchConfig::default();
            println!();
            println!("{:<14} {:>12}", "candidate", "BIC");
            for candidate in fit_candidates(closes, &config.grid, config.parallel) {
                match candidate {
                    CandidateFit::Fitted(m) => println!("{:<14} {:>12.3}", m.order().to_string(), m.bic()),
                    CandidateFit::Failed { order, reason } => {
                        println!("{:<14} {:>12}  ({reason})", order.to_string(), "failed")
                    }
                }
            }
            let forecast = perform_arima_forecast(closes, &config)?;
            println!();
            println!("selected {} stderr {:.4}", forecast.order, forecast.stderr);
            for (step, (f, band)) in forecast.path.iter().zip(&forecast.bands).enumerate() {
                println!(
                    "  t+{}: {:>10.3}  80% [{:.3}, {:.3}]",
                    step + 1,
                    f,
                    band.lower,
                    band.upper
                );
            }
        }
        ForecastModel::Lstm => {
            let forecaster = LstmForecaster::new(LstmConfig::default());
            let f = forecaster.forecast(closes)?;
            println!("forecast {:.3} stderr {:.4}", f.forecast, f.stderr);
            println!("  80% [{:.3}, {:.3}]", f.band_80.lower, f.band_80.upper);
            println!("  95% [{:.3}, {:.3}]", f.band_95.lower, f.band_95.upper);
        }
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let bt = &result.config.backtest;
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", result.strategy);
    println!("Symbol:         {}", result.symbol);
    println!("Period:         {} to {}", bt.start_date, bt.end_date);
    println!(
        "Bars:           {} ({} warmup)",
        result.bar_count, result.warmup_bars
    );
    println!("Decisions:      {}", m.decision_count);
    println!();
    println!("--- Performance ---");
    println!("Final Value:    ${:.2}", result.final_value);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Buy & Hold:     {:.2}%", m.buy_and_hold_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Exposure:       {:.1}%", m.exposure * 100.0);
    println!(
        "Entries/Exits:  {} / {} ({} flips)",
        m.entries, m.exits, m.flips
    );
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}
