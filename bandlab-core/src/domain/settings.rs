//! Backtest settings a strategy declares (or receives) during setup.
//!
//! These mirror what a hosting platform asks for before the first bar:
//! the date range, starting cash, benchmark, brokerage model and the
//! instrument subscription itself.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Bar resolution of a subscription. Every shipped strategy runs daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Daily,
}

/// How prices are presented to the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Unmodified exchange prices; dividends are paid as cash.
    #[default]
    Raw,
    /// Split- and dividend-adjusted closes.
    Adjusted,
}

/// Brokerage whose fee and margin model the host should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brokerage {
    #[default]
    InteractiveBrokers,
    Default,
}

/// Account type: margin allows leverage and shorting, cash does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Margin,
    Cash,
}

/// A single instrument subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub symbol: String,
    pub resolution: Resolution,
    pub normalization: NormalizationMode,
}

/// Settings a host needs before it can start delivering bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSettings {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cash: f64,
    pub benchmark: String,
    pub brokerage: Brokerage,
    pub account_type: AccountType,
}

impl AlgorithmSettings {
    /// Whether `date` falls inside the backtest window (both ends inclusive).
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
