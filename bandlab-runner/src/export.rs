//! Reporting and export: JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: decision tape and equity curve for external analysis tools
//! - **Markdown**: human-readable single-run report
//!
//! Persisted results carry a `schema_version`; newer versions are rejected
//! on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::replay::{Decision, EquityPoint};
use crate::runner::{BacktestResult, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: result.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Decision tape: date, symbol, kind, target, price, portfolio_value, tag.
pub fn export_decisions_csv(decisions: &[Decision]) -> Result<String, ExportError> {
    rows_to_csv(decisions)
}

/// Equity curve: date, close, allocation, equity.
pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String, ExportError> {
    rows_to_csv(curve)
}

fn rows_to_csv<T: Serialize>(rows: &[T]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Directory name for a run: `{strategy}_{symbol}_{run_id[..8]}`.
pub fn artifact_dir_name(result: &BacktestResult) -> String {
    let short: String = result.run_id.chars().take(8).collect();
    format!("{}_{}_{}", result.strategy, result.symbol, short)
}

/// Save the full artifact set for a single backtest run.
///
/// Creates `{strategy}_{symbol}_{hash8}/` under `output_dir` containing
/// `result.json`, `decisions.csv`, `equity.csv` and `report.md`, and
/// returns its path. Re-running the same config overwrites the bundle.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let run_dir = output_dir.join(artifact_dir_name(result));
    std::fs::create_dir_all(&run_dir).map_err(io_error(&run_dir))?;

    let files = [
        ("result.json", export_json(result)?),
        ("decisions.csv", export_decisions_csv(&result.decisions)?),
        ("equity.csv", export_equity_csv(&result.equity_curve)?),
        ("report.md", generate_report(result)),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents).map_err(io_error(&path))?;
    }
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's result.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult, ExportError> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path).map_err(io_error(&path))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let bt = &result.config.backtest;
    let m = &result.metrics;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    let _ = writeln!(md, "| Strategy | {} |", result.strategy);
    let _ = writeln!(md, "| Symbol | {} |", result.symbol);
    let _ = writeln!(md, "| Benchmark | {} |", result.config.benchmark());
    let _ = writeln!(md, "| Period | {} to {} |", bt.start_date, bt.end_date);
    let _ = writeln!(md, "| Initial Cash | ${:.0} |", result.initial_cash);
    let _ = writeln!(md, "| Final Value | ${:.2} |", result.final_value);
    let _ = writeln!(
        md,
        "| Bars | {} ({} warmup) |",
        result.bar_count, result.warmup_bars
    );
    let _ = writeln!(md, "| Run ID | {} |", result.run_id);
    let _ = writeln!(md, "| Dataset Hash | {} |", result.dataset_hash);
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    let _ = writeln!(md, "| Total Return | {:.2}% |", m.total_return * 100.0);
    let _ = writeln!(md, "| Buy & Hold | {:.2}% |", m.buy_and_hold_return * 100.0);
    let _ = writeln!(md, "| CAGR | {:.2}% |", m.cagr * 100.0);
    let _ = writeln!(md, "| Sharpe | {:.3} |", m.sharpe);
    let _ = writeln!(md, "| Sortino | {:.3} |", m.sortino);
    let _ = writeln!(md, "| Calmar | {:.3} |", m.calmar);
    let _ = writeln!(md, "| Max Drawdown | {:.2}% |", m.max_drawdown * 100.0);
    let _ = writeln!(md, "| Exposure | {:.1}% |", m.exposure * 100.0);
    let _ = writeln!(
        md,
        "| Entries / Exits / Flips | {} / {} / {} |",
        m.entries, m.exits, m.flips
    );
    md.push('\n');

    if !result.decisions.is_empty() {
        md.push_str("## Decisions\n\n");
        md.push_str("| Date | Target | Price | Tag |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        for d in &result.decisions {
            let price = d.price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"));
            let _ = writeln!(
                md,
                "| {} | {:+.0}% | {} | {} |",
                d.date,
                d.target * 100.0,
                price,
                d.tag
            );
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::DecisionKind;
    use chrono::NaiveDate;

    #[test]
    fn decisions_csv_has_header_and_rows() {
        let decisions = vec![Decision {
            date: NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
            symbol: "SPY".into(),
            kind: DecisionKind::Liquidate,
            target: 0.0,
            price: None,
            portfolio_value: 2000.0,
            tag: "stop_loss".into(),
        }];
        let csv = export_decisions_csv(&decisions).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("date,symbol,kind,target,price,portfolio_value,tag")
        );
        assert_eq!(lines.next(), Some("2023-01-03,SPY,liquidate,0.0,,2000.0,stop_loss"));
    }

    #[test]
    fn empty_equity_csv_is_empty() {
        assert_eq!(export_equity_csv(&[]).unwrap(), "");
    }
}
