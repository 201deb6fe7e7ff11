pub mod calculator;
pub mod checklist;
pub mod error;
pub mod profiles;
pub mod progress;
pub mod rules;

pub use calculator::{pip_value, position_size, PositionSize, SizingInput};
pub use checklist::{Checklist, ChecklistItem, ChecklistSection, ChecklistStatus};
pub use error::RiskError;
pub use profiles::{PhaseProfile, TradingPhase};
pub use progress::{evaluation_progress, EvaluationProgress};
pub use rules::{
    validate_trade, ComplianceSummary, DailyActivity, RuleCheck, RuleMonitor, RuleReport, RuleStatus,
    TradeProposal,
};
