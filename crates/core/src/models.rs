use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// The kind of platform a broker connection talks to.
///
/// MT4 and MT5 share the socket bridge; `API` is a plain REST gateway.
/// Anything else is carried through as `Other` so that connecting can reject
/// it with a readable message instead of failing at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlatformKind {
    Mt4,
    Mt5,
    Api,
    Other(String),
}

impl PlatformKind {
    pub fn as_str(&self) -> &str {
        match self {
            PlatformKind::Mt4 => "MT4",
            PlatformKind::Mt5 => "MT5",
            PlatformKind::Api => "API",
            PlatformKind::Other(name) => name,
        }
    }
}

impl From<String> for PlatformKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "MT4" => PlatformKind::Mt4,
            "MT5" => PlatformKind::Mt5,
            "API" => PlatformKind::Api,
            _ => PlatformKind::Other(value),
        }
    }
}

impl From<&str> for PlatformKind {
    fn from(value: &str) -> Self {
        PlatformKind::from(value.to_string())
    }
}

impl From<PlatformKind> for String {
    fn from(kind: PlatformKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A broker endpoint the desk can connect an account through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConnection {
    pub id: String,
    /// Broker display name (e.g. "FTMO").
    pub name: String,
    pub platform: PlatformKind,
    pub host: String,
    pub port: Option<u16>,
}

/// Login material for a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// MT4/MT5 terminal login.
    Terminal {
        login: String,
        password: String,
        #[serde(default)]
        server: String,
    },
    /// Bearer key for REST gateways.
    ApiKey {
        api_key: String,
        #[serde(default)]
        api_secret: Option<String>,
    },
}

/// A well-known broker endpoint offered in the connection form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPreset {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub platform: PlatformKind,
}

impl BrokerPreset {
    pub fn new(name: &str, host: &str, port: Option<u16>, platform: PlatformKind) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
            platform,
        }
    }

    /// Built-in presets shown by the connection dialog.
    pub fn defaults() -> Vec<BrokerPreset> {
        vec![
            Self::new("IC Markets", "icmarkets-demo.com", Some(443), PlatformKind::Mt4),
            Self::new("Pepperstone", "pepperstone-demo.com", Some(443), PlatformKind::Mt5),
            Self::new("XM", "xm-demo.com", Some(443), PlatformKind::Mt4),
            Self::new("FTMO", "ftmo-server.com", Some(443), PlatformKind::Mt4),
            Self::new("MyFundedFX", "myfundedfx-server.com", Some(443), PlatformKind::Mt5),
            Self::new("OANDA", "api-fxpractice.oanda.com", Some(443), PlatformKind::Api),
            Self::new("Interactive Brokers", "api.ibkr.com", Some(443), PlatformKind::Api),
            Self::new("Custom", "", None, PlatformKind::Mt4),
        ]
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Demo,
    Live,
}

/// The platform an account is hosted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "MT4")]
    Mt4,
    #[serde(rename = "MT5")]
    Mt5,
    #[serde(rename = "cTrader")]
    CTrader,
    TradingView,
    Custom,
}

/// A connected trading account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingAccount {
    pub id: String,
    pub name: String,
    pub broker: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub platform: Platform,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
    pub margin_level: Decimal,
    pub profit: Decimal,
    pub currency: String,
    pub leverage: u32,
    pub connected: bool,
    pub last_update: DateTime<Utc>,
    pub server: Option<String>,
    pub login: Option<String>,
}

impl TradingAccount {
    /// Overwrite the balance figures from a streamed snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &AccountSnapshot) {
        self.balance = snapshot.balance;
        self.equity = snapshot.equity;
        self.margin = snapshot.margin;
        self.free_margin = snapshot.free_margin;
        self.margin_level = snapshot.margin_level;
        self.profit = snapshot.profit;
        self.last_update = Utc::now();
    }
}

/// The mutable part of an account carried by streamed updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    pub free_margin: Decimal,
    pub margin_level: Decimal,
    pub profit: Decimal,
}

// ---------------------------------------------------------------------------
// Positions & orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// An open position as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Broker ticket.
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub volume: Decimal,
    pub open_price: Decimal,
    pub current_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub profit: Decimal,
    pub swap: Decimal,
    pub commission: Decimal,
    pub open_time: DateTime<Utc>,
    pub comment: Option<String>,
}

/// Pending order types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    BuyLimit,
    SellLimit,
    BuyStop,
    SellStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected,
}

/// A working order as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub volume: Decimal,
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub expiration: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub status: OrderStatus,
}

/// A market order to send through a connected account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub side: Side,
    pub volume: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl TradeRequest {
    pub fn market(symbol: &str, side: Side, volume: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            volume,
            price: None,
            stop_loss: None,
            take_profit: None,
            comment: None,
        }
    }

    pub fn with_stops(mut self, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }
}

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// Latest quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub spread: Decimal,
    /// Price precision of the instrument.
    pub digits: u32,
    /// Size of one point.
    pub point: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl MarketData {
    pub fn new(symbol: &str, bid: Decimal, ask: Decimal, digits: u32, point: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            bid,
            ask,
            spread: ask.saturating_sub(bid),
            digits,
            point,
            timestamp: Utc::now(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_platform_kind_round_trips_known_names() {
        assert_eq!(PlatformKind::from("MT5"), PlatformKind::Mt5);
        assert_eq!(PlatformKind::from("API"), PlatformKind::Api);
        assert_eq!(
            PlatformKind::from("cTrader"),
            PlatformKind::Other("cTrader".to_string())
        );
        let json = serde_json::to_string(&PlatformKind::Mt4).unwrap();
        assert_eq!(json, "\"MT4\"");
    }

    #[test]
    fn test_credentials_pick_variant_from_fields() {
        let terminal: Credentials =
            serde_json::from_str(r#"{"login":"5001","password":"pw","server":"Demo-1"}"#).unwrap();
        assert!(matches!(terminal, Credentials::Terminal { .. }));

        let key: Credentials = serde_json::from_str(r#"{"api_key":"abc"}"#).unwrap();
        assert!(matches!(key, Credentials::ApiKey { .. }));
    }

    #[test]
    fn test_market_data_derives_spread() {
        let quote = MarketData::new("XAUUSD", dec!(2650.10), dec!(2650.45), 2, dec!(0.01));
        assert_eq!(quote.spread, dec!(0.35));
    }
}
