use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::profiles::PhaseProfile;

/// Dollar value per pip for 0.01 lot, by instrument.
const PIP_VALUES: &[(&str, Decimal)] = &[
    ("XAUUSD", Decimal::ONE),
    ("US30", Decimal::ONE),
    ("NAS100", Decimal::ONE),
    ("SPX500", Decimal::ONE),
    ("GER40", Decimal::ONE),
];

pub fn pip_value(instrument: &str) -> Decimal {
    PIP_VALUES
        .iter()
        .find(|(symbol, _)| symbol.eq_ignore_ascii_case(instrument))
        .map(|(_, value)| *value)
        .unwrap_or(Decimal::ONE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingInput {
    pub instrument: String,
    pub balance: Decimal,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    /// Percent of balance to risk; the phase default when absent.
    #[serde(default)]
    pub risk_pct: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub instrument: String,
    pub risk_pct: Decimal,
    pub risk_amount: Decimal,
    /// Absolute entry-to-stop distance in price points.
    pub distance: Decimal,
    pub pip_value: Decimal,
    pub lots: Decimal,
    pub max_risk: Decimal,
    pub within_limit: bool,
}

/// Lot size that loses `balance * risk%` if the stop is hit.
pub fn position_size(input: &SizingInput, profile: &PhaseProfile) -> Result<PositionSize, RiskError> {
    let risk_pct = input.risk_pct.unwrap_or(profile.default_risk_pct);
    if risk_pct.is_sign_negative() {
        return Err(RiskError::InvalidSetup("risk percentage cannot be negative".to_string()));
    }
    if input.balance <= Decimal::ZERO {
        return Err(RiskError::InvalidBalance(format!("{} is not a tradable balance", input.balance)));
    }

    let distance = input
        .entry
        .checked_sub(input.stop_loss)
        .ok_or_else(|| RiskError::out_of_range("stop distance"))?
        .abs();
    if distance.is_zero() {
        return Err(RiskError::InvalidSetup("entry and stop loss must differ".to_string()));
    }

    let risk_amount = input
        .balance
        .checked_mul(risk_pct)
        .ok_or_else(|| RiskError::out_of_range("risk amount"))?
        / dec!(100);
    let pip = pip_value(&input.instrument);
    let lots = distance
        .checked_mul(pip * dec!(100))
        .and_then(|per_lot| risk_amount.checked_div(per_lot))
        .ok_or_else(|| RiskError::out_of_range("position size"))?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(PositionSize {
        instrument: input.instrument.clone(),
        risk_pct,
        risk_amount,
        distance,
        pip_value: pip,
        lots,
        max_risk: profile.max_risk_per_trade,
        within_limit: risk_amount <= profile.max_risk_per_trade,
    })
}
