use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JournalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Breakeven,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Breakeven => "breakeven",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(Outcome::Win),
            "loss" => Ok(Outcome::Loss),
            "breakeven" | "be" => Ok(Outcome::Breakeven),
            other => Err(JournalError::UnknownOutcome(other.to_string())),
        }
    }
}

/// One reviewed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub instrument: String,
    pub setup: String,
    pub outcome: Outcome,
    pub pnl: Decimal,
    pub lessons: String,
    pub emotions: String,
    /// 1 (poor execution) to 5 (textbook).
    pub rating: u8,
    pub tags: Vec<String>,
}

impl JournalEntry {
    /// Case-insensitive match against setup, lessons and instrument.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [&self.setup, &self.lessons, &self.instrument]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

/// Form input for a new entry. Tags arrive comma-separated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub instrument: String,
    #[serde(default)]
    pub setup: String,
    pub outcome: Outcome,
    pub pnl: Decimal,
    #[serde(default)]
    pub lessons: String,
    #[serde(default)]
    pub emotions: String,
    #[serde(default = "default_rating")]
    pub rating: u8,
    #[serde(default)]
    pub tags: String,
}

fn default_rating() -> u8 {
    3
}

/// Split a comma-separated tag list, dropping blanks.
pub fn split_tags(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tags() {
        assert_eq!(
            split_tags(" PO3, Distribution ,,External Sweep, ", ','),
            vec!["PO3", "Distribution", "External Sweep"]
        );
        assert!(split_tags("  ", ',').is_empty());
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!("WIN".parse::<Outcome>().unwrap(), Outcome::Win);
        assert_eq!("breakeven".parse::<Outcome>().unwrap(), Outcome::Breakeven);
        assert!("draw".parse::<Outcome>().is_err());
    }
}
