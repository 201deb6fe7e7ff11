//! CSV import/export.
//!
//! Columns: `id,date,instrument,setup,outcome,pnl,lessons,emotions,rating,tags`
//! with RFC 3339 dates and tags joined by `;`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::entry::{split_tags, JournalEntry, Outcome};
use crate::error::JournalError;
use crate::journal::Journal;

const TAG_SEPARATOR: char = ';';

const HEADER: [&str; 10] = [
    "id", "date", "instrument", "setup", "outcome", "pnl", "lessons", "emotions", "rating", "tags",
];

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    id: String,
    date: String,
    instrument: String,
    setup: String,
    outcome: String,
    pnl: String,
    lessons: String,
    emotions: String,
    rating: u8,
    tags: String,
}

impl From<&JournalEntry> for Row {
    fn from(entry: &JournalEntry) -> Self {
        Row {
            id: entry.id.clone(),
            date: entry.date.to_rfc3339(),
            instrument: entry.instrument.clone(),
            setup: entry.setup.clone(),
            outcome: entry.outcome.to_string(),
            pnl: entry.pnl.to_string(),
            lessons: entry.lessons.clone(),
            emotions: entry.emotions.clone(),
            rating: entry.rating,
            tags: entry.tags.join(&TAG_SEPARATOR.to_string()),
        }
    }
}

impl TryFrom<Row> for JournalEntry {
    type Error = JournalError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        if !(1..=5).contains(&row.rating) {
            return Err(JournalError::InvalidRating(row.rating));
        }
        let date = DateTime::parse_from_rfc3339(&row.date)
            .map_err(|e| JournalError::ParseError(format!("Invalid date '{}': {}", row.date, e)))?
            .with_timezone(&Utc);
        let pnl = Decimal::from_str(&row.pnl)
            .map_err(|e| JournalError::ParseError(format!("Invalid pnl '{}': {}", row.pnl, e)))?;

        Ok(JournalEntry {
            id: row.id,
            date,
            instrument: row.instrument,
            setup: row.setup,
            outcome: Outcome::from_str(&row.outcome)?,
            pnl,
            lessons: row.lessons,
            emotions: row.emotions,
            rating: row.rating,
            tags: split_tags(&row.tags, TAG_SEPARATOR),
        })
    }
}

pub fn read_entries<R: Read>(reader: R) -> Result<Vec<JournalEntry>, JournalError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for result in reader.deserialize::<Row>() {
        let row = result.map_err(|e| JournalError::ParseError(format!("CSV record error: {}", e)))?;
        entries.push(JournalEntry::try_from(row)?);
    }
    Ok(entries)
}

pub fn write_entries<W: Write>(writer: W, entries: &[JournalEntry]) -> Result<(), JournalError> {
    let mut writer = csv::Writer::from_writer(writer);
    // `serialize` only emits the header along with the first row.
    if entries.is_empty() {
        writer
            .write_record(HEADER)
            .map_err(|e| JournalError::ParseError(format!("CSV write error: {}", e)))?;
    }
    for entry in entries {
        writer
            .serialize(Row::from(entry))
            .map_err(|e| JournalError::ParseError(format!("CSV write error: {}", e)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a journal from a CSV file.
pub fn load(path: &Path) -> Result<Journal, JournalError> {
    let file = std::fs::File::open(path)?;
    Ok(Journal::from_entries(read_entries(file)?))
}

pub fn save(path: &Path, journal: &Journal) -> Result<(), JournalError> {
    let file = std::fs::File::create(path)?;
    write_entries(file, journal.entries())
}
