use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::entry::{split_tags, JournalEntry, NewEntry, Outcome};
use crate::error::JournalError;

/// Aggregate figures over a set of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    /// Wins over all entries, in percent.
    pub win_rate: Decimal,
    pub net_pnl: Decimal,
    pub average_rating: Decimal,
}

impl JournalStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> Self {
        let mut stats = JournalStats::default();
        let mut rating_sum = 0u32;
        for entry in entries {
            stats.total += 1;
            match entry.outcome {
                Outcome::Win => stats.wins += 1,
                Outcome::Loss => stats.losses += 1,
                Outcome::Breakeven => stats.breakeven += 1,
            }
            stats.net_pnl = stats.net_pnl.saturating_add(entry.pnl);
            rating_sum += u32::from(entry.rating);
        }
        if stats.total > 0 {
            let total = Decimal::from(stats.total);
            stats.win_rate = (Decimal::from(stats.wins) * Decimal::ONE_HUNDRED / total).round_dp(2);
            stats.average_rating = (Decimal::from(rating_sum) / total).round_dp(2);
        }
        stats
    }
}

/// Entries newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing entries, ordering them newest first.
    pub fn from_entries(mut entries: Vec<JournalEntry>) -> Self {
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Self { entries }
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Record a new entry at the top of the journal.
    pub fn add(&mut self, input: NewEntry) -> Result<&JournalEntry, JournalError> {
        if !(1..=5).contains(&input.rating) {
            return Err(JournalError::InvalidRating(input.rating));
        }
        let instrument = input.instrument.trim();
        if instrument.is_empty() {
            return Err(JournalError::MissingField("instrument".to_string()));
        }
        let in_range = self
            .entries
            .iter()
            .try_fold(input.pnl, |net, e| net.checked_add(e.pnl))
            .is_some();
        if !in_range {
            return Err(JournalError::ParseError(format!(
                "pnl {} puts the journal total out of range",
                input.pnl
            )));
        }

        let entry = JournalEntry {
            id: Uuid::new_v4().to_string(),
            date: Utc::now(),
            instrument: instrument.to_string(),
            setup: input.setup,
            outcome: input.outcome,
            pnl: input.pnl,
            lessons: input.lessons,
            emotions: input.emotions,
            rating: input.rating,
            tags: split_tags(&input.tags, ','),
        };
        info!(id = %entry.id, instrument = %entry.instrument, outcome = %entry.outcome, "Journal entry added");
        self.entries.insert(0, entry);
        Ok(&self.entries[0])
    }

    pub fn remove(&mut self, id: &str) -> Option<JournalEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Entries matching `term` (empty matches all) and, if given, `outcome`.
    pub fn search(&self, term: &str, outcome: Option<Outcome>) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| term.is_empty() || e.matches(term))
            .filter(|e| outcome.map_or(true, |o| e.outcome == o))
            .collect()
    }

    pub fn stats(&self) -> JournalStats {
        JournalStats::from_entries(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(instrument: &str, setup: &str, outcome: Outcome, pnl: Decimal, rating: u8) -> NewEntry {
        NewEntry {
            instrument: instrument.to_string(),
            setup: setup.to_string(),
            outcome,
            pnl,
            lessons: String::new(),
            emotions: String::new(),
            rating,
            tags: "PO3, Distribution, ".to_string(),
        }
    }

    fn sample() -> Journal {
        let mut journal = Journal::new();
        journal
            .add(input("XAUUSD", "External liquidity sweep at 2640 EQ lows", Outcome::Win, dec!(45.50), 5))
            .unwrap();
        journal
            .add(input("US30", "Markup phase, entered without purge", Outcome::Loss, dec!(-18.25), 2))
            .unwrap();
        journal
            .add(input("NAS100", "Flat day, scratched at entry", Outcome::Breakeven, dec!(0), 3))
            .unwrap();
        journal
    }

    #[test]
    fn test_add_puts_newest_first_and_splits_tags() {
        let journal = sample();
        assert_eq!(journal.len(), 3);
        assert_eq!(journal.entries()[0].instrument, "NAS100");
        assert_eq!(journal.entries()[0].tags, vec!["PO3", "Distribution"]);
        assert!(!journal.entries()[0].id.is_empty());
    }

    #[test]
    fn test_rating_out_of_range_is_rejected() {
        let mut journal = Journal::new();
        let err = journal
            .add(input("XAUUSD", "", Outcome::Win, dec!(1), 6))
            .unwrap_err();
        assert!(matches!(err, JournalError::InvalidRating(6)));
        assert!(journal.add(input("XAUUSD", "", Outcome::Win, dec!(1), 0)).is_err());
        assert!(journal.is_empty());
    }

    #[test]
    fn test_search_and_filter() {
        let journal = sample();
        assert_eq!(journal.search("sweep", None).len(), 1);
        assert_eq!(journal.search("us30", None).len(), 1);
        assert_eq!(journal.search("", Some(Outcome::Loss)).len(), 1);
        assert_eq!(journal.search("", None).len(), 3);
        assert!(journal.search("markup", Some(Outcome::Win)).is_empty());
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.breakeven, 1);
        assert_eq!(stats.win_rate, dec!(33.33));
        assert_eq!(stats.net_pnl, dec!(27.25));
        assert_eq!(stats.average_rating, dec!(3.33));
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(Journal::new().stats(), JournalStats::default());
    }

    #[test]
    fn test_pnl_overflowing_the_total_is_rejected() {
        let mut journal = Journal::new();
        journal
            .add(input("XAUUSD", "", Outcome::Win, Decimal::MAX, 3))
            .unwrap();
        let err = journal
            .add(input("XAUUSD", "", Outcome::Win, Decimal::MAX, 3))
            .unwrap_err();
        assert!(matches!(err, JournalError::ParseError(_)));
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.stats().net_pnl, Decimal::MAX);
    }

    #[test]
    fn test_stats_saturate_on_loaded_totals() {
        let mut big = sample().entries()[0].clone();
        big.pnl = Decimal::MAX;
        let journal = Journal::from_entries(vec![big.clone(), big]);
        assert_eq!(journal.stats().net_pnl, Decimal::MAX);
    }

    #[test]
    fn test_remove() {
        let mut journal = sample();
        let id = journal.entries()[1].id.clone();
        assert!(journal.remove(&id).is_some());
        assert!(journal.get(&id).is_none());
        assert!(journal.remove(&id).is_none());
    }
}
