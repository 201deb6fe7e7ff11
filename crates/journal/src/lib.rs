pub mod csv_io;
pub mod entry;
pub mod error;
pub mod journal;

pub use entry::{JournalEntry, NewEntry, Outcome};
pub use error::JournalError;
pub use journal::{Journal, JournalStats};
