use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::profiles::PhaseProfile;

/// Where an evaluation stands against its profit target and drawdown limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationProgress {
    pub initial_balance: Decimal,
    pub balance: Decimal,
    pub total_pnl: Decimal,
    pub profit_target: Decimal,
    pub profit_progress_pct: Decimal,
    pub max_drawdown: Decimal,
    /// Drawdown from the initial balance, in percent of that balance.
    pub drawdown_pct: Decimal,
    /// Share of the allowed drawdown already used, in percent.
    pub drawdown_usage_pct: Decimal,
    pub target_reached: bool,
    pub drawdown_breached: bool,
}

pub fn evaluation_progress(
    initial_balance: Decimal,
    balance: Decimal,
    profile: &PhaseProfile,
) -> Result<EvaluationProgress, RiskError> {
    if initial_balance <= Decimal::ZERO {
        return Err(RiskError::InvalidBalance(
            "initial balance must be positive".to_string(),
        ));
    }

    let out_of_range = || RiskError::out_of_range("balance");
    let total_pnl = balance.checked_sub(initial_balance).ok_or_else(out_of_range)?;
    let profit_target = profile.profit_target(initial_balance).ok_or_else(out_of_range)?;
    let max_drawdown = profile.max_drawdown(initial_balance).ok_or_else(out_of_range)?;
    let drawdown = initial_balance
        .checked_sub(balance)
        .ok_or_else(out_of_range)?
        .max(Decimal::ZERO);
    let drawdown_pct = ratio_pct(drawdown, initial_balance).ok_or_else(out_of_range)?;

    Ok(EvaluationProgress {
        initial_balance,
        balance,
        total_pnl,
        profit_target,
        profit_progress_pct: ratio_pct(total_pnl, profit_target).ok_or_else(out_of_range)?,
        max_drawdown,
        drawdown_pct,
        drawdown_usage_pct: ratio_pct(drawdown_pct, profile.max_drawdown_pct)
            .ok_or_else(out_of_range)?,
        target_reached: total_pnl >= profit_target,
        drawdown_breached: drawdown >= max_drawdown,
    })
}

fn ratio_pct(value: Decimal, of: Decimal) -> Option<Decimal> {
    if of.is_zero() {
        return Some(Decimal::ZERO);
    }
    Some(value.checked_div(of)?.checked_mul(dec!(100))?.round_dp(2))
}
