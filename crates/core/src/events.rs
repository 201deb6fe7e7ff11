use crate::models::*;
use serde::{Deserialize, Serialize};

/// An account's balance figures changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub account_id: String,
    pub account: TradingAccount,
}

/// The full set of open positions for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionsUpdate {
    pub account_id: String,
    pub positions: Vec<Position>,
}

/// The full set of working orders for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersUpdate {
    pub account_id: String,
    pub orders: Vec<Order>,
}

/// A batch of quotes, already applied to the market data table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataUpdate {
    pub prices: Vec<MarketData>,
}

/// A stream frame that could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFault {
    pub account_id: String,
    pub message: String,
}

/// Every event the desk publishes, tagged by its public name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TradingEvent {
    AccountUpdate(AccountUpdate),
    PositionsUpdate(PositionsUpdate),
    OrdersUpdate(OrdersUpdate),
    MarketDataUpdate(MarketDataUpdate),
    StreamFault(StreamFault),
}

impl TradingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TradingEvent::AccountUpdate(_) => "account_update",
            TradingEvent::PositionsUpdate(_) => "positions_update",
            TradingEvent::OrdersUpdate(_) => "orders_update",
            TradingEvent::MarketDataUpdate(_) => "market_data_update",
            TradingEvent::StreamFault(_) => "stream_fault",
        }
    }
}
