//! Performance metrics: pure functions over a replayed run.
//!
//! Equity metrics take the end-of-day equity series; activity metrics take
//! the recorded decisions and allocations. Nothing here touches the host.

use serde::{Deserialize, Serialize};

use crate::replay::{Decision, EquityPoint};

/// Aggregate statistics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    /// Buy-and-hold return of the traded symbol over the same window.
    pub buy_and_hold_return: f64,
    /// Fraction of bars ending with a non-zero allocation.
    pub exposure: f64,
    pub decision_count: usize,
    pub entries: usize,
    pub exits: usize,
    pub flips: usize,
}

impl PerformanceMetrics {
    pub fn compute(curve: &[EquityPoint], decisions: &[Decision]) -> Self {
        let equity: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        let closes: Vec<f64> = curve.iter().filter_map(|p| p.close).collect();
        let trading_days = equity.len();
        let activity = Activity::from_decisions(decisions);
        Self {
            total_return: total_return(&equity),
            cagr: cagr(&equity, trading_days),
            sharpe: sharpe_ratio(&equity, 0.0),
            sortino: sortino_ratio(&equity, 0.0),
            calmar: calmar_ratio(&equity, trading_days),
            max_drawdown: max_drawdown(&equity),
            buy_and_hold_return: total_return(&closes),
            exposure: exposure(curve),
            decision_count: decisions.len(),
            entries: activity.entries,
            exits: activity.exits,
            flips: activity.flips,
        }
    }
}

// ─── Equity metrics ─────────────────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (final_eq - initial) / initial
}

/// Compound Annual Growth Rate, assuming 252 trading days per year.
pub fn cagr(equity_curve: &[f64], trading_days: usize) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || trading_days < 2 || initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / 252.0;
    (final_eq / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily returns.
///
/// Returns 0.0 if variance is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let excess = excess_returns(equity_curve, risk_free_rate);
    if excess.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / std) * (252.0_f64).sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let excess = excess_returns(equity_curve, risk_free_rate);
    if excess.len() < 2 {
        return 0.0;
    }
    let downside: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside / excess.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / downside_std) * (252.0_f64).sqrt()
}

/// Calmar ratio: CAGR / |max_drawdown|. Zero without a drawdown or gain.
pub fn calmar_ratio(equity_curve: &[f64], trading_days: usize) -> f64 {
    let c = cagr(equity_curve, trading_days);
    let dd = max_drawdown(equity_curve);
    if dd >= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

// ─── Activity metrics ───────────────────────────────────────────────

/// Fraction of bars ending with a non-zero allocation.
pub fn exposure(curve: &[EquityPoint]) -> f64 {
    if curve.is_empty() {
        return 0.0;
    }
    let invested = curve.iter().filter(|p| p.allocation != 0.0).count();
    invested as f64 / curve.len() as f64
}

#[derive(Debug, Default)]
struct Activity {
    entries: usize,
    exits: usize,
    flips: usize,
}

impl Activity {
    /// Walk decisions in order, classifying each change of allocation.
    fn from_decisions(decisions: &[Decision]) -> Self {
        let mut activity = Activity::default();
        let mut held = 0.0_f64;
        for d in decisions {
            match (held == 0.0, d.target == 0.0) {
                (true, false) => activity.entries += 1,
                (false, true) => activity.exits += 1,
                (false, false) if held.signum() != d.target.signum() => activity.flips += 1,
                _ => {}
            }
            held = d.target;
        }
        activity
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Compute daily returns from an equity curve.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn excess_returns(equity_curve: &[f64], risk_free_rate: f64) -> Vec<f64> {
    let daily_rf = risk_free_rate / 252.0;
    daily_returns(equity_curve)
        .into_iter()
        .map(|r| r - daily_rf)
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
