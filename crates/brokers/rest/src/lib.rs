//! REST broker adapter.
//!
//! A single account lookup against `{host}/api/account`; there is no streaming
//! channel on this path.

pub mod client;

pub use client::{RestAccount, RestClient};
