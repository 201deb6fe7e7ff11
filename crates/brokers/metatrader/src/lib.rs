//! MetaTrader 4/5 broker adapter.
//!
//! Talks to a socket bridge (an EA inside the terminal or a relay in front of
//! it) over WebSocket using JSON frames tagged by `action` outbound and `type`
//! inbound.

pub mod client;
pub mod normalize;
pub mod protocol;

pub use client::{Handshake, MetaTraderClient, MetaTraderConfig, StreamHandler, StreamUpdate};
pub use protocol::ProtocolError;
