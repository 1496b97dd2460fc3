//! Bar loading for the runner.
//!
//! Bars come from a CSV file (`date,open,high,low,close,volume[,adj_close]`,
//! Yahoo-style headers accepted) or, when asked for, from a deterministic
//! synthetic random walk. The loaded range starts `warmup_days` before the
//! backtest start so that history and indicators are ready on day one.
//!
//! Synthetic data is a developer-only debug mode. Results produced on
//! synthetic data are tagged as such.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use bandlab_core::domain::Bar;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("no bars for '{symbol}' between {start} and {end}")]
    Empty {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no data source for '{symbol}' (pass --data <csv> or --synthetic)")]
    NoSource { symbol: String },
}

/// Where the bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    Synthetic,
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// First backtest date (inclusive).
    pub start: NaiveDate,
    /// Last backtest date (inclusive).
    pub end: NaiveDate,
    /// Calendar days loaded before `start`.
    pub warmup_days: u32,
    /// CSV file to read.
    pub csv_path: Option<PathBuf>,
    /// Generate synthetic bars when no CSV is given.
    pub synthetic: bool,
}

impl LoadOptions {
    /// First date of the loaded range, including warm-up.
    pub fn load_start(&self) -> NaiveDate {
        self.start
            .checked_sub_days(Days::new(u64::from(self.warmup_days)))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Result of loading bars, including data source provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Date-ordered bars covering warm-up plus the backtest window.
    pub bars: Vec<Bar>,
    pub source: DataSource,
    /// Dataset hash for fingerprinting (BLAKE3 over all bar data).
    pub dataset_hash: String,
    pub has_synthetic: bool,
    /// Rows dropped for failing OHLC sanity checks.
    pub dropped_rows: usize,
}

/// Raw CSV row.
#[derive(Debug, Deserialize)]
struct CsvBar {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume")]
    volume: f64,
    #[serde(default, alias = "Adj Close", alias = "adj close")]
    adj_close: Option<f64>,
}

impl CsvBar {
    fn into_bar(self, symbol: &str) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume.max(0.0) as u64,
            adj_close: self.adj_close.unwrap_or(self.close),
        }
    }
}

/// Load bars for `symbol` from CSV or, if enabled, synthetic data.
///
/// This is the primary entry point for the runner to get bar data.
pub fn load_bars(symbol: &str, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let from = opts.load_start();
    let (raw, source) = match &opts.csv_path {
        Some(path) => (read_csv_bars(path, symbol)?, DataSource::Csv),
        None if opts.synthetic => {
            warn!(symbol, "generating synthetic data, results will be tagged as synthetic");
            (
                generate_synthetic_bars(symbol, from, opts.end),
                DataSource::Synthetic,
            )
        }
        None => {
            return Err(LoadError::NoSource {
                symbol: symbol.to_string(),
            })
        }
    };

    let (bars, dropped_rows) = clean_bars(raw, from, opts.end);
    if dropped_rows > 0 {
        warn!(symbol, dropped_rows, "dropped bars failing OHLC sanity checks");
    }
    if !bars.iter().any(|b| b.date >= opts.start && b.date <= opts.end) {
        return Err(LoadError::Empty {
            symbol: symbol.to_string(),
            start: opts.start,
            end: opts.end,
        });
    }

    let dataset_hash = compute_dataset_hash(symbol, &bars);
    info!(symbol, bars = bars.len(), ?source, hash = %&dataset_hash[..8], "loaded bars");

    Ok(LoadedData {
        bars,
        source,
        dataset_hash,
        has_synthetic: source == DataSource::Synthetic,
        dropped_rows,
    })
}

/// Read every row of a CSV file as bars for `symbol`.
pub fn read_csv_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv_bars(file, symbol)
}

pub fn parse_csv_bars<R: Read>(reader: R, symbol: &str) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    rdr.deserialize::<CsvBar>()
        .map(|row| Ok(row?.into_bar(symbol)))
        .collect()
}

/// Sort by date, drop duplicates and insane rows, and clip to `[from, to]`.
fn clean_bars(mut bars: Vec<Bar>, from: NaiveDate, to: NaiveDate) -> (Vec<Bar>, usize) {
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    bars.retain(|b| b.date >= from && b.date <= to);
    let before = bars.len();
    bars.retain(Bar::is_sane);
    let dropped = before - bars.len();
    (bars, dropped)
}

/// Compute a deterministic BLAKE3 hash over all bar data.
fn compute_dataset_hash(symbol: &str, bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
        hasher.update(&bar.adj_close.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate synthetic weekday bars for testing/development.
///
/// Produces a random walk from a starting price of 100.0, seeded from the
/// symbol name so a symbol always gets the same path.
pub fn generate_synthetic_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        let weekday = current.weekday();
        if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
            let daily_return: f64 = rng.gen_range(-0.02..0.021);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);

            bars.push(Bar {
                symbol: symbol.to_string(),
                date: current,
                open,
                high,
                low,
                close,
                volume,
                adj_close: close,
            });
            price = close;
        }

        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    bars
}
