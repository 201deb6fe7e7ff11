//! Bridge payloads to canonical desk types.

use chrono::{DateTime, Utc};
use po3_core::wire::non_zero;
use po3_core::*;

use crate::protocol::*;

/// Identity of the terminal login an `account_info` frame answers.
#[derive(Debug, Clone)]
pub struct LoginContext<'a> {
    pub connection: &'a BrokerConnection,
    pub login: &'a str,
    pub server: &'a str,
}

/// Deterministic account id for a terminal login.
pub fn account_id(connection_id: &str, login: &str) -> String {
    format!("{connection_id}_{login}")
}

pub fn account_from_info(ctx: &LoginContext<'_>, info: &WireAccount) -> TradingAccount {
    let platform = match ctx.connection.platform {
        PlatformKind::Mt4 => Platform::Mt4,
        _ => Platform::Mt5,
    };
    TradingAccount {
        id: account_id(&ctx.connection.id, ctx.login),
        name: format!("{} - {}", ctx.connection.name, ctx.login),
        broker: ctx.connection.name.clone(),
        account_number: ctx.login.to_string(),
        account_type: if info.demo {
            AccountType::Demo
        } else {
            AccountType::Live
        },
        platform,
        balance: info.balance,
        equity: info.equity,
        margin: info.margin,
        free_margin: info.free_margin,
        margin_level: info.margin_level,
        profit: info.profit,
        currency: info.currency.clone(),
        leverage: info.leverage,
        connected: true,
        last_update: Utc::now(),
        server: Some(ctx.server.to_string()),
        login: Some(ctx.login.to_string()),
    }
}

pub fn snapshot(update: &WireAccountUpdate) -> AccountSnapshot {
    AccountSnapshot {
        balance: update.balance,
        equity: update.equity,
        margin: update.margin,
        free_margin: update.free_margin,
        margin_level: update.margin_level,
        profit: update.profit,
    }
}

pub fn position(wire: &WirePosition) -> Position {
    Position {
        id: wire.ticket.clone(),
        symbol: wire.symbol.clone(),
        side: if wire.kind == 0 { Side::Buy } else { Side::Sell },
        volume: wire.volume,
        open_price: wire.open_price,
        current_price: wire.current_price,
        stop_loss: non_zero(wire.sl),
        take_profit: non_zero(wire.tp),
        profit: wire.profit,
        swap: wire.swap,
        commission: wire.commission,
        open_time: from_unix(wire.open_time),
        comment: wire.comment.clone(),
    }
}

pub fn order(wire: &WireOrder) -> Order {
    Order {
        id: wire.ticket.clone(),
        symbol: wire.symbol.clone(),
        order_type: order_type(wire.kind),
        volume: wire.volume,
        price: wire.price,
        stop_loss: non_zero(wire.sl),
        take_profit: non_zero(wire.tp),
        expiration: wire.expiration.filter(|secs| *secs != 0).map(from_unix),
        comment: wire.comment.clone(),
        status: OrderStatus::Pending,
    }
}

/// Map an MT pending-order code; unknown codes fall back to buy limit.
pub fn order_type(code: i64) -> OrderType {
    match code {
        2 => OrderType::BuyLimit,
        3 => OrderType::SellLimit,
        4 => OrderType::BuyStop,
        5 => OrderType::SellStop,
        _ => OrderType::BuyLimit,
    }
}

pub fn market_data(wire: &WirePrice) -> MarketData {
    MarketData::new(&wire.symbol, wire.bid, wire.ask, wire.digits, wire.point)
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
