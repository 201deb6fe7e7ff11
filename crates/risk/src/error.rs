#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskError {
    #[error("Invalid setup: {0}")]
    InvalidSetup(String),
    #[error("Invalid balance: {0}")]
    InvalidBalance(String),
    #[error("Unknown trading phase: {0}")]
    UnknownPhase(String),
    #[error("Unknown checklist item: {section}/{item}")]
    UnknownItem { section: String, item: String },
}

impl RiskError {
    /// A figure too large for decimal arithmetic.
    pub(crate) fn out_of_range(what: &str) -> Self {
        RiskError::InvalidSetup(format!("{} is out of range", what))
    }
}
