use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::profiles::PhaseProfile;

// ---------------------------------------------------------------------------
// Pre-trade validation
// ---------------------------------------------------------------------------

/// A trade about to be logged or sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub risk_amount: Decimal,
    pub reward_ratio: Decimal,
    /// Trades already taken today.
    #[serde(default)]
    pub trades_today: u32,
}

/// Rule breaches that block a trade, in a fixed order. Empty means the trade
/// may go ahead.
pub fn validate_trade(proposal: &TradeProposal, profile: &PhaseProfile) -> Vec<String> {
    let mut violations = Vec::new();

    if proposal.risk_amount > profile.max_risk_per_trade {
        violations.push(format!(
            "Risk exceeds {}% limit (${:.2})",
            profile.default_risk_pct, profile.max_risk_per_trade
        ));
    }
    if proposal.reward_ratio < profile.min_reward_ratio {
        violations.push(format!(
            "Minimum {}R reward ratio required",
            profile.min_reward_ratio.normalize()
        ));
    }
    if proposal.trades_today >= profile.max_trades_per_day {
        violations.push(format!(
            "Daily trade limit ({}) exceeded",
            profile.max_trades_per_day
        ));
    }

    if !violations.is_empty() {
        warn!(phase = %profile.phase, "Trade validation failed: {}", violations.join(", "));
    }
    violations
}

// ---------------------------------------------------------------------------
// Rule monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Compliant,
    Warning,
    Violation,
    /// In progress, e.g. working toward the daily target or resting
    /// between sessions.
    Active,
}

/// Today's trading activity as seen by the monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub trades_today: u32,
    /// Realized plus floating P&L for the day.
    pub daily_pnl: Decimal,
    /// Drawdown from the initial balance, in percent.
    pub drawdown_pct: Decimal,
    #[serde(default)]
    pub last_trade_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: RuleStatus,
    pub current: Decimal,
    pub limit: Decimal,
    /// `current / limit` in percent, capped at 100 except for drawdown.
    pub progress: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub violations: usize,
    pub warnings: usize,
    pub compliant: usize,
}

impl ComplianceSummary {
    pub fn all_clear(&self) -> bool {
        self.violations == 0 && self.warnings == 0
    }

    pub fn headline(&self) -> String {
        if self.violations > 0 {
            format!("{} Violations", self.violations)
        } else if self.warnings > 0 {
            format!("{} Warnings", self.warnings)
        } else {
            "All Clear".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleReport {
    pub rules: Vec<RuleCheck>,
    pub summary: ComplianceSummary,
}

/// Evaluates the prop-firm rules of one phase against today's activity.
#[derive(Debug, Clone)]
pub struct RuleMonitor {
    profile: PhaseProfile,
}

impl RuleMonitor {
    pub fn new(profile: PhaseProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &PhaseProfile {
        &self.profile
    }

    pub fn evaluate(&self, activity: &DailyActivity, now: DateTime<Utc>) -> RuleReport {
        let rules = vec![
            self.check_daily_trades(activity),
            self.check_daily_profit(activity),
            self.check_daily_loss(activity),
            self.check_drawdown(activity),
            self.check_session_break(activity, now),
        ];

        let mut summary = ComplianceSummary::default();
        for rule in &rules {
            match rule.status {
                RuleStatus::Violation => summary.violations += 1,
                RuleStatus::Warning => summary.warnings += 1,
                RuleStatus::Compliant => summary.compliant += 1,
                RuleStatus::Active => {}
            }
        }
        RuleReport { rules, summary }
    }

    /// Graded against the warning threshold. `breach_at_limit` decides
    /// whether reaching the limit exactly is already a violation.
    fn graded(&self, current: Decimal, limit: Decimal, breach_at_limit: bool) -> RuleStatus {
        let breached = if breach_at_limit {
            current >= limit
        } else {
            current > limit
        };
        if breached {
            RuleStatus::Violation
        } else if current >= limit * self.profile.warning_threshold {
            RuleStatus::Warning
        } else {
            RuleStatus::Compliant
        }
    }

    fn check_daily_trades(&self, activity: &DailyActivity) -> RuleCheck {
        let current = Decimal::from(activity.trades_today);
        let limit = Decimal::from(self.profile.max_trades_per_day);
        RuleCheck {
            id: "daily_trades".to_string(),
            name: "Daily Trade Limit".to_string(),
            description: format!(
                "Max {} trades per day during {}",
                self.profile.max_trades_per_day, self.profile.phase
            ),
            status: self.graded(current, limit, false),
            current,
            limit,
            progress: capped_progress(current, limit),
        }
    }

    fn check_daily_profit(&self, activity: &DailyActivity) -> RuleCheck {
        let current = activity.daily_pnl.max(Decimal::ZERO);
        let limit = self.profile.daily_profit_target;
        let status = if current >= limit {
            // Target banked: stop trading for the day.
            RuleStatus::Warning
        } else if current > Decimal::ZERO {
            RuleStatus::Active
        } else {
            RuleStatus::Compliant
        };
        RuleCheck {
            id: "daily_profit".to_string(),
            name: "Daily Profit Target".to_string(),
            description: format!(
                "Stop trading after +${} daily profit ({}R)",
                limit.normalize(),
                self.profile.min_reward_ratio.normalize()
            ),
            status,
            current,
            limit,
            progress: capped_progress(current, limit),
        }
    }

    fn check_daily_loss(&self, activity: &DailyActivity) -> RuleCheck {
        let current = (-activity.daily_pnl).max(Decimal::ZERO);
        let limit = self.profile.daily_loss_limit;
        RuleCheck {
            id: "daily_loss".to_string(),
            name: "Daily Loss Limit".to_string(),
            description: format!("Stop trading after -${} daily loss", limit.normalize()),
            status: self.graded(current, limit, true),
            current,
            limit,
            progress: capped_progress(current, limit),
        }
    }

    fn check_drawdown(&self, activity: &DailyActivity) -> RuleCheck {
        let current = activity.drawdown_pct.max(Decimal::ZERO);
        let limit = self.profile.max_drawdown_pct;
        RuleCheck {
            id: "drawdown".to_string(),
            name: "Maximum Drawdown".to_string(),
            description: format!(
                "{}% maximum drawdown from initial balance",
                limit.normalize()
            ),
            status: self.graded(current, limit, true),
            current,
            limit,
            progress: percent(current, limit),
        }
    }

    fn check_session_break(&self, activity: &DailyActivity, now: DateTime<Utc>) -> RuleCheck {
        let required = Duration::hours(i64::from(self.profile.session_break_hours));
        let limit = Decimal::from(self.profile.session_break_hours);
        let (current, status) = match activity.last_trade_at {
            Some(at) => {
                let elapsed = (now - at).max(Duration::zero());
                let hours = Decimal::from(elapsed.num_minutes()) / dec!(60);
                let status = if elapsed < required {
                    RuleStatus::Active
                } else {
                    RuleStatus::Compliant
                };
                (hours.round_dp(2), status)
            }
            None => (limit, RuleStatus::Compliant),
        };
        RuleCheck {
            id: "session_break".to_string(),
            name: "Session Break".to_string(),
            description: format!(
                "{}-hour break between trading sessions",
                self.profile.session_break_hours
            ),
            status,
            current,
            limit,
            progress: capped_progress(current, limit),
        }
    }
}

/// Figures beyond decimal range pin to the top of the scale.
fn percent(current: Decimal, limit: Decimal) -> Decimal {
    if limit.is_zero() {
        return Decimal::ZERO;
    }
    current
        .checked_div(limit)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .map_or(Decimal::MAX, |pct| pct.round_dp(2))
}

fn capped_progress(current: Decimal, limit: Decimal) -> Decimal {
    percent(current, limit).min(dec!(100))
}
