use po3_core::wire::{opt_string_or_number, string_or_number};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Messages sent from the desk TO the MetaTrader bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// First frame on a new socket.
    Authenticate {
        login: String,
        password: String,
        server: String,
    },
    /// Ask for streamed updates of the given kinds.
    Subscribe { types: Vec<String> },
    /// Open a market position.
    PlaceOrder {
        order_id: String,
        symbol: String,
        /// 0 = buy, 1 = sell.
        #[serde(rename = "type")]
        side: u8,
        #[serde(with = "rust_decimal::serde::float")]
        volume: Decimal,
        #[serde(
            with = "rust_decimal::serde::float_option",
            skip_serializing_if = "Option::is_none"
        )]
        price: Option<Decimal>,
        #[serde(
            with = "rust_decimal::serde::float_option",
            skip_serializing_if = "Option::is_none"
        )]
        sl: Option<Decimal>,
        #[serde(
            with = "rust_decimal::serde::float_option",
            skip_serializing_if = "Option::is_none"
        )]
        tp: Option<Decimal>,
        comment: String,
    },
    /// Close an open position by ticket.
    ClosePosition { ticket: String },
}

/// Messages received FROM the MetaTrader bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Reply to `authenticate`.
    AccountInfo { account: WireAccount },
    /// Bridge-side failure, e.g. bad login.
    Error {
        #[serde(default)]
        message: String,
    },
    AccountUpdate { account: WireAccountUpdate },
    PositionUpdate {
        #[serde(default)]
        positions: Vec<WirePosition>,
    },
    OrderUpdate {
        #[serde(default)]
        orders: Vec<WireOrder>,
    },
    PriceUpdate {
        #[serde(default)]
        prices: Vec<WirePrice>,
    },
    /// Reply to `place_order`.
    OrderResult {
        #[serde(deserialize_with = "string_or_number")]
        order_id: String,
        #[serde(default)]
        success: bool,
        #[serde(default, deserialize_with = "opt_string_or_number")]
        ticket: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    /// Reply to `close_position`.
    CloseResult {
        #[serde(deserialize_with = "string_or_number")]
        ticket: String,
        #[serde(default)]
        success: bool,
    },
    #[serde(other)]
    Unrecognized,
}

/// Account block of `account_info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireAccount {
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub equity: Decimal,
    #[serde(default)]
    pub margin: Decimal,
    #[serde(default)]
    pub free_margin: Decimal,
    #[serde(default)]
    pub margin_level: Decimal,
    #[serde(default)]
    pub profit: Decimal,
    #[serde(default)]
    pub currency: String,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default)]
    pub demo: bool,
}

fn default_leverage() -> u32 {
    1
}

/// Account block of `account_update`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireAccountUpdate {
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub equity: Decimal,
    #[serde(default)]
    pub margin: Decimal,
    #[serde(default)]
    pub free_margin: Decimal,
    #[serde(default)]
    pub margin_level: Decimal,
    #[serde(default)]
    pub profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WirePosition {
    #[serde(deserialize_with = "string_or_number")]
    pub ticket: String,
    pub symbol: String,
    /// 0 = buy, anything else = sell.
    #[serde(rename = "type", default)]
    pub kind: i64,
    pub volume: Decimal,
    pub open_price: Decimal,
    #[serde(default)]
    pub current_price: Decimal,
    #[serde(default)]
    pub sl: Option<Decimal>,
    #[serde(default)]
    pub tp: Option<Decimal>,
    #[serde(default)]
    pub profit: Decimal,
    #[serde(default)]
    pub swap: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    /// Unix seconds.
    #[serde(default)]
    pub open_time: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireOrder {
    #[serde(deserialize_with = "string_or_number")]
    pub ticket: String,
    pub symbol: String,
    /// MT order type code: 2 buy limit, 3 sell limit, 4 buy stop, 5 sell stop.
    #[serde(rename = "type", default)]
    pub kind: i64,
    pub volume: Decimal,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub sl: Option<Decimal>,
    #[serde(default)]
    pub tp: Option<Decimal>,
    /// Unix seconds, 0 when the order never expires.
    #[serde(default)]
    pub expiration: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WirePrice {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub digits: u32,
    #[serde(default)]
    pub point: Decimal,
}

/// Why an inbound frame could not be turned into an [`InboundFrame`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("frame has no type tag")]
    MissingType,
    #[error("unrecognized message type: {0}")]
    UnrecognizedMessage(String),
    #[error("bridge reported: {0}")]
    Remote(String),
}

/// Decode one text frame.
///
/// Unknown `type` tags are reported as [`ProtocolError::UnrecognizedMessage`]
/// rather than dropped.
pub fn decode(text: &str) -> Result<InboundFrame, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let tag = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    match serde_json::from_value::<InboundFrame>(value) {
        Ok(InboundFrame::Unrecognized) => Err(ProtocolError::UnrecognizedMessage(tag)),
        Ok(frame) => Ok(frame),
        Err(e) => Err(ProtocolError::Malformed(format!("{tag}: {e}"))),
    }
}

/// Encode one outbound frame as JSON text.
pub fn encode(frame: &OutboundFrame) -> Result<String, ProtocolError> {
    serde_json::to_string(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_place_order_omits_absent_levels() {
        let frame = OutboundFrame::PlaceOrder {
            order_id: "abc".to_string(),
            symbol: "XAUUSD".to_string(),
            side: 0,
            volume: dec!(0.01),
            price: None,
            sl: Some(dec!(2640.5)),
            tp: None,
            comment: "PO3 Framework Trade".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&frame).unwrap()).unwrap();

        assert_eq!(value["action"], "place_order");
        assert_eq!(value["type"], 0);
        assert_eq!(value["volume"], 0.01);
        assert_eq!(value["sl"], 2640.5);
        assert!(value.get("price").is_none());
        assert!(value.get("tp").is_none());
    }

    #[test]
    fn test_authenticate_and_subscribe_shapes() {
        let auth = OutboundFrame::Authenticate {
            login: "5001".to_string(),
            password: "pw".to_string(),
            server: "Demo-1".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&auth).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"action": "authenticate", "login": "5001", "password": "pw", "server": "Demo-1"})
        );

        let sub = OutboundFrame::Subscribe {
            types: vec!["account".to_string(), "prices".to_string()],
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&sub).unwrap()).unwrap();
        assert_eq!(value["action"], "subscribe");
        assert_eq!(value["types"][1], "prices");
    }

    #[test]
    fn test_decodes_price_update() {
        let frame = decode(
            r#"{"type":"price_update","prices":[{"symbol":"XAUUSD","bid":2650.1,"ask":2650.45,"digits":2,"point":0.01}]}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::PriceUpdate { prices } => {
                assert_eq!(prices.len(), 1);
                assert_eq!(prices[0].bid, dec!(2650.1));
                assert_eq!(prices[0].ask, dec!(2650.45));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_order_result_accepts_numeric_ticket() {
        let frame =
            decode(r#"{"type":"order_result","order_id":"42","success":true,"ticket":778899}"#)
                .unwrap();
        assert_eq!(
            frame,
            InboundFrame::OrderResult {
                order_id: "42".to_string(),
                success: true,
                ticket: Some("778899".to_string()),
                error: None,
            }
        );
    }

    #[test]
    fn test_unknown_tag_is_reported() {
        assert_eq!(
            decode(r#"{"type":"heartbeat","ts":1}"#),
            Err(ProtocolError::UnrecognizedMessage("heartbeat".to_string()))
        );
    }

    #[test]
    fn test_missing_tag_and_bad_json() {
        assert_eq!(decode(r#"{"positions":[]}"#), Err(ProtocolError::MissingType));
        assert!(matches!(decode("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"type":"close_result"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
