//! Per-instance strategy state: entry price and re-entry cooldown.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days a strategy stays out of the market after an exit.
pub const DEFAULT_COOLDOWN_DAYS: u32 = 31;

/// Why a position was closed or flipped; doubles as the decision tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    BelowBand,
    AboveBand,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::BelowBand => "below_band",
            ExitReason::AboveBand => "above_band",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry price and the earliest date a new entry is allowed.
///
/// At most one entry price is tracked; an exit clears it and arms the
/// cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    entry_price: Option<f64>,
    next_entry_time: NaiveDate,
    cooldown_days: u32,
}

impl StrategyState {
    pub fn new(cooldown_days: u32) -> Self {
        Self {
            entry_price: None,
            next_entry_time: NaiveDate::MIN,
            cooldown_days,
        }
    }

    /// Start of a run: flat, and allowed to enter immediately.
    pub fn reset(&mut self, start: NaiveDate) {
        self.entry_price = None;
        self.next_entry_time = start;
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    pub fn next_entry_time(&self) -> NaiveDate {
        self.next_entry_time
    }

    pub fn cooldown_days(&self) -> u32 {
        self.cooldown_days
    }

    pub fn can_enter(&self, now: NaiveDate) -> bool {
        self.next_entry_time <= now
    }

    pub fn record_entry(&mut self, price: f64) {
        self.entry_price = Some(price);
    }

    /// Clear the entry and stay out for the cooldown period.
    pub fn record_exit(&mut self, now: NaiveDate) {
        self.entry_price = None;
        self.arm_cooldown(now);
    }

    pub fn arm_cooldown(&mut self, now: NaiveDate) {
        self.next_entry_time = now
            .checked_add_days(Days::new(u64::from(self.cooldown_days)))
            .unwrap_or(NaiveDate::MAX);
    }
}

impl Default for StrategyState {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reset_allows_immediate_entry() {
        let mut state = StrategyState::default();
        state.reset(day(2023, 1, 3));
        assert!(state.can_enter(day(2023, 1, 3)));
        assert!(!state.can_enter(day(2023, 1, 2)));
    }

    #[test]
    fn exit_clears_entry_and_arms_cooldown() {
        let mut state = StrategyState::default();
        state.reset(day(2023, 1, 3));
        state.record_entry(100.0);
        state.record_exit(day(2023, 2, 1));
        assert_eq!(state.entry_price(), None);
        assert_eq!(state.next_entry_time(), day(2023, 3, 4));
        assert!(!state.can_enter(day(2023, 3, 3)));
        assert!(state.can_enter(day(2023, 3, 4)));
    }

    #[test]
    fn cooldown_saturates_at_max_date() {
        let mut state = StrategyState::new(31);
        state.arm_cooldown(NaiveDate::MAX);
        assert_eq!(state.next_entry_time(), NaiveDate::MAX);
    }

    #[test]
    fn exit_reason_tags() {
        assert_eq!(ExitReason::TakeProfit.to_string(), "take_profit");
        assert_eq!(ExitReason::BelowBand.as_str(), "below_band");
    }
}
