//! ATR/RSI risk-reward: enter above the SMA when the ATR reward/risk ratio
//! is good enough, exit at an ATR stop or target around the entry.
//!
//! Nothing happens until the cooldown has elapsed; the gate covers both the
//! entry and the exit check, and an entry arms it as well.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{NormalizationMode, Resolution, TargetAllocation};
use crate::indicators::{IndicatorHandle, IndicatorSpec};

use super::host::{Host, Setup};
use super::state::{ExitReason, StrategyState, DEFAULT_COOLDOWN_DAYS};
use super::{log_portfolio_value, Strategy, StrategyError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskRewardParams {
    pub sma_period: usize,
    pub atr_period: usize,
    pub rsi_period: usize,
    pub stop_atr_multiple: f64,
    pub take_atr_multiple: f64,
    /// Required `(take − close) / (close − stop)`.
    pub min_reward_risk: f64,
    pub cooldown_days: u32,
}

impl Default for RiskRewardParams {
    fn default() -> Self {
        Self {
            sma_period: 14,
            atr_period: 14,
            rsi_period: 14,
            stop_atr_multiple: 1.0,
            take_atr_multiple: 2.0,
            min_reward_risk: 2.0,
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
        }
    }
}

/// Stop and target levels around a reference price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone)]
struct Handles {
    sma: IndicatorHandle,
    atr: IndicatorHandle,
    rsi: IndicatorHandle,
}

#[derive(Debug, Clone)]
pub struct RiskReward {
    symbol: String,
    normalization: NormalizationMode,
    params: RiskRewardParams,
    state: StrategyState,
    handles: Option<Handles>,
}

impl RiskReward {
    pub fn new(symbol: impl Into<String>, params: RiskRewardParams) -> Self {
        let state = StrategyState::new(params.cooldown_days);
        Self {
            symbol: symbol.into(),
            normalization: NormalizationMode::Raw,
            params,
            state,
            handles: None,
        }
    }

    pub fn with_normalization(mut self, normalization: NormalizationMode) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn params(&self) -> &RiskRewardParams {
        &self.params
    }

    pub fn levels(&self, reference: f64, atr: f64) -> RiskLevels {
        RiskLevels {
            stop_loss: reference - self.params.stop_atr_multiple * atr,
            take_profit: reference + self.params.take_atr_multiple * atr,
        }
    }

    /// Whether a setup at `close` offers at least the required reward/risk.
    pub fn acceptable(&self, close: f64, levels: RiskLevels) -> bool {
        levels.take_profit - close >= self.params.min_reward_risk * (close - levels.stop_loss)
    }

    fn try_enter(&mut self, host: &mut dyn Host, handles: &Handles, close: f64) {
        let now = host.time();
        let Some(sma) = host.indicator(&handles.sma) else {
            debug!(symbol = %self.symbol, %now, "SMA warming up");
            return;
        };
        if close <= sma {
            return;
        }
        let Some(atr) = host.indicator(&handles.atr) else {
            debug!(symbol = %self.symbol, %now, "ATR warming up");
            return;
        };
        let rsi = host.indicator(&handles.rsi);

        let levels = self.levels(close, atr);
        if self.acceptable(close, levels) {
            host.set_holdings(&self.symbol, TargetAllocation::FULL_LONG, "entry");
            self.state.record_entry(close);
            self.state.arm_cooldown(now);
            info!(
                symbol = %self.symbol,
                %now,
                price = close,
                stop_loss = levels.stop_loss,
                take_profit = levels.take_profit,
                rsi,
                "BUY"
            );
        }
    }

    fn check_exit(&mut self, host: &mut dyn Host, handles: &Handles, close: f64) {
        let now = host.time();
        let (Some(entry), Some(atr)) = (self.state.entry_price(), host.indicator(&handles.atr))
        else {
            return;
        };
        let levels = self.levels(entry, atr);
        let reason = if close <= levels.stop_loss {
            ExitReason::StopLoss
        } else if close >= levels.take_profit {
            ExitReason::TakeProfit
        } else {
            return;
        };

        host.liquidate(reason.as_str());
        self.state.record_exit(now);
        info!(symbol = %self.symbol, %now, price = close, entry, %reason, "SELL");
    }
}

impl Strategy for RiskReward {
    fn name(&self) -> &str {
        "risk_reward"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn initialize(&mut self, setup: &mut Setup) -> Result<(), StrategyError> {
        setup.add_equity(&self.symbol, Resolution::Daily, self.normalization);
        self.handles = Some(Handles {
            atr: setup.register_indicator(&self.symbol, IndicatorSpec::Atr(self.params.atr_period)),
            rsi: setup.register_indicator(&self.symbol, IndicatorSpec::Rsi(self.params.rsi_period)),
            sma: setup.register_indicator(&self.symbol, IndicatorSpec::Sma(self.params.sma_period)),
        });
        self.state.reset(setup.settings().start_date);
        Ok(())
    }

    fn on_data(&mut self, host: &mut dyn Host) -> Result<(), StrategyError> {
        let handles = self
            .handles
            .clone()
            .ok_or_else(|| StrategyError::NotInitialized(self.name().to_string()))?;

        if self.state.can_enter(host.time()) {
            if let Some(close) = host.current_price(&self.symbol) {
                if host.is_invested() {
                    self.check_exit(host, &handles, close);
                } else {
                    self.try_enter(host, &handles, close);
                }
            }
        }

        log_portfolio_value(self.name(), host);
        Ok(())
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, AlgorithmSettings, Brokerage};
    use crate::strategy::testing::{day, Action, ScriptedHost};

    fn initialized() -> (RiskReward, Setup) {
        let mut strategy = RiskReward::new("SPY", RiskRewardParams::default());
        let mut setup = Setup::new(AlgorithmSettings {
            start_date: day(2023, 4, 1),
            end_date: day(2023, 7, 1),
            cash: 2000.0,
            benchmark: "SPY".into(),
            brokerage: Brokerage::InteractiveBrokers,
            account_type: AccountType::Margin,
        });
        strategy.initialize(&mut setup).unwrap();
        (strategy, setup)
    }

    fn set_indicators(host: &mut ScriptedHost, setup: &Setup, sma: f64, atr: f64) {
        for handle in setup.indicators() {
            let value = match handle.spec {
                IndicatorSpec::Sma(_) => sma,
                IndicatorSpec::Atr(_) => atr,
                IndicatorSpec::Rsi(_) => 55.0,
                IndicatorSpec::Ema(_) => continue,
            };
            host.indicators.insert(handle.clone(), value);
        }
    }

    #[test]
    fn registers_three_indicators() {
        let (_, setup) = initialized();
        assert_eq!(setup.indicators().len(), 3);
    }

    #[test]
    fn default_multiples_always_meet_two_to_one() {
        let strategy = RiskReward::new("SPY", RiskRewardParams::default());
        let levels = strategy.levels(400.0, 5.0);
        assert_eq!(levels.stop_loss, 395.0);
        assert_eq!(levels.take_profit, 410.0);
        assert!(strategy.acceptable(400.0, levels));
    }

    #[test]
    fn no_entry_while_sma_not_ready() {
        let (mut strategy, _) = initialized();
        let mut host = ScriptedHost::new(day(2023, 4, 3));
        host.bar(day(2023, 4, 3), 410.0);
        strategy.on_data(&mut host).unwrap();
        assert!(host.actions.is_empty());
    }

    #[test]
    fn no_entry_below_sma() {
        let (mut strategy, setup) = initialized();
        let mut host = ScriptedHost::new(day(2023, 4, 3));
        set_indicators(&mut host, &setup, 420.0, 5.0);
        host.bar(day(2023, 4, 3), 410.0);
        strategy.on_data(&mut host).unwrap();
        assert!(host.actions.is_empty());
    }

    #[test]
    fn entry_arms_cooldown_and_exit_waits_for_it() {
        let (mut strategy, setup) = initialized();
        let mut host = ScriptedHost::new(day(2023, 4, 3));
        set_indicators(&mut host, &setup, 400.0, 5.0);

        host.bar(day(2023, 4, 3), 410.0);
        strategy.on_data(&mut host).unwrap();
        assert_eq!(host.actions, vec![Action::SetHoldings(1.0, "entry".into())]);
        assert_eq!(strategy.state().next_entry_time(), day(2023, 5, 4));

        // Stop is 405, but the cooldown gate blocks the exit check.
        host.bar(day(2023, 4, 4), 400.0);
        strategy.on_data(&mut host).unwrap();
        assert_eq!(host.actions.len(), 1);

        host.bar(day(2023, 5, 4), 404.0);
        strategy.on_data(&mut host).unwrap();
        assert_eq!(host.actions[1], Action::Liquidate("stop_loss".into()));
        assert_eq!(strategy.state().entry_price(), None);
        assert_eq!(strategy.state().next_entry_time(), day(2023, 6, 4));
    }

    #[test]
    fn on_data_before_initialize_fails() {
        let mut strategy = RiskReward::new("SPY", RiskRewardParams::default());
        let mut host = ScriptedHost::new(day(2023, 4, 3));
        let err = strategy.on_data(&mut host).unwrap_err();
        assert!(matches!(err, StrategyError::NotInitialized(_)));
    }
}
