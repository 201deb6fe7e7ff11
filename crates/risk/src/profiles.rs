use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RiskError;

/// Where an account is in the prop-firm programme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingPhase {
    #[default]
    Evaluation,
    Funded,
}

impl TradingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingPhase::Evaluation => "evaluation",
            TradingPhase::Funded => "funded",
        }
    }

    pub fn profile(self) -> PhaseProfile {
        match self {
            TradingPhase::Evaluation => PhaseProfile::evaluation(),
            TradingPhase::Funded => PhaseProfile::funded(),
        }
    }
}

impl fmt::Display for TradingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingPhase {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evaluation" | "eval" => Ok(TradingPhase::Evaluation),
            "funded" => Ok(TradingPhase::Funded),
            other => Err(RiskError::UnknownPhase(other.to_string())),
        }
    }
}

/// Risk rules for one trading phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProfile {
    pub phase: TradingPhase,
    pub name: String,
    /// Risk per trade offered by default, in percent of balance.
    pub default_risk_pct: Decimal,
    /// Risk percentages the calculator offers.
    pub risk_options: Vec<Decimal>,
    /// Hard cap on dollars at risk per trade.
    pub max_risk_per_trade: Decimal,
    /// Minimum reward-to-risk multiple.
    pub min_reward_ratio: Decimal,
    pub max_trades_per_day: u32,
    /// Stop trading for the day once this profit is banked.
    pub daily_profit_target: Decimal,
    pub daily_loss_limit: Decimal,
    /// Maximum drawdown from the initial balance, in percent.
    pub max_drawdown_pct: Decimal,
    /// Minimum rest between sessions.
    pub session_break_hours: u32,
    /// Evaluation profit target, in percent of the initial balance.
    pub profit_target_pct: Decimal,
    /// Fraction of a limit at which a rule starts warning (0.9 = 90%).
    pub warning_threshold: Decimal,
}

impl PhaseProfile {
    /// Evaluation: 0.75% default risk, capped at $37.50 per trade.
    pub fn evaluation() -> Self {
        Self {
            phase: TradingPhase::Evaluation,
            name: "Evaluation".to_string(),
            default_risk_pct: dec!(0.75),
            risk_options: vec![dec!(0.25), dec!(0.50), dec!(0.75), dec!(1.00)],
            max_risk_per_trade: dec!(37.50),
            ..Self::shared()
        }
    }

    /// Funded: 0.50% default risk, capped at $25 per trade.
    pub fn funded() -> Self {
        Self {
            phase: TradingPhase::Funded,
            name: "Funded".to_string(),
            default_risk_pct: dec!(0.50),
            risk_options: vec![dec!(0.25), dec!(0.50)],
            max_risk_per_trade: dec!(25),
            ..Self::shared()
        }
    }

    fn shared() -> Self {
        Self {
            phase: TradingPhase::Evaluation,
            name: String::new(),
            default_risk_pct: Decimal::ZERO,
            risk_options: Vec::new(),
            max_risk_per_trade: Decimal::ZERO,
            min_reward_ratio: dec!(2),
            max_trades_per_day: 3,
            daily_profit_target: dec!(75),
            daily_loss_limit: dec!(75),
            max_drawdown_pct: dec!(10),
            session_break_hours: 6,
            profit_target_pct: dec!(10),
            warning_threshold: dec!(0.90),
        }
    }

    /// Dollar profit target for an evaluation started at `initial_balance`.
    pub fn profit_target(&self, initial_balance: Decimal) -> Option<Decimal> {
        Some(initial_balance.checked_mul(self.profit_target_pct)? / dec!(100))
    }

    /// Dollar drawdown allowed from `initial_balance`.
    pub fn max_drawdown(&self, initial_balance: Decimal) -> Option<Decimal> {
        Some(initial_balance.checked_mul(self.max_drawdown_pct)? / dec!(100))
    }
}
