//! Trading service: one connection per account, a shared store for streamed
//! state, and typed listeners for every update.

pub mod bus;
pub mod config;
pub mod service;
pub mod store;

pub use bus::{Delivery, EventBus, Subscription, Topic};
pub use config::ServiceConfig;
pub use service::TradingService;
pub use store::{Removed, Store};
