mod common;

use common::*;
use po3_core::*;
use po3_service::{ServiceConfig, TradingService};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn unsupported_platform_is_rejected() {
    let service = TradingService::new(ServiceConfig::default());
    let connection = BrokerConnection {
        id: "ctrader_1".to_string(),
        name: "Spotware".to_string(),
        platform: PlatformKind::from("cTrader"),
        host: "127.0.0.1".to_string(),
        port: None,
    };

    let err = service.connect(&connection, &credentials()).await.unwrap_err();
    assert_eq!(err, BrokerError::UnsupportedPlatform("cTrader".to_string()));
    assert_eq!(err.to_string(), "Unsupported platform: cTrader");
    assert!(service.accounts().is_empty());
}

#[tokio::test]
async fn mismatched_credentials_are_rejected() {
    let service = TradingService::new(ServiceConfig::default());
    let connection = BrokerConnection {
        id: "ftmo_1".to_string(),
        name: "FTMO".to_string(),
        platform: PlatformKind::Mt4,
        host: "127.0.0.1".to_string(),
        port: Some(1),
    };
    let api_key = Credentials::ApiKey {
        api_key: "key".to_string(),
        api_secret: None,
    };

    let err = service.connect(&connection, &api_key).await.unwrap_err();
    assert!(matches!(err, BrokerError::InvalidCredentials(_)));
}

#[tokio::test]
async fn connect_registers_account_and_subscribes() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());

    let account = service
        .connect(&bridge.connection(), &credentials())
        .await
        .unwrap();

    assert_eq!(account.id, "ftmo_1_5001");
    assert_eq!(account.name, "FTMO - 5001");
    assert_eq!(account.broker, "FTMO");
    assert_eq!(account.account_number, "5001");
    assert_eq!(account.platform, Platform::Mt5);
    assert_eq!(account.account_type, AccountType::Demo);
    assert_eq!(account.server.as_deref(), Some("FTMO-Demo"));
    assert!(account.connected);

    let auth = bridge.expect_action("authenticate").await;
    assert_eq!(auth["login"], "5001");
    assert_eq!(auth["password"], "secret");
    assert_eq!(auth["server"], "FTMO-Demo");

    let subscribe = bridge.expect_action("subscribe").await;
    assert_eq!(subscribe["types"], json!(["account", "positions", "orders", "prices"]));

    assert_eq!(service.account("ftmo_1_5001"), Some(account));
    assert_eq!(service.accounts().len(), 1);
}

#[tokio::test]
async fn error_frame_rejects_connect() {
    let bridge = FakeBridge::start(Auth::Reject).await;
    let service = TradingService::new(ServiceConfig::default());

    let err = service
        .connect(&bridge.connection(), &credentials())
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::Authentication("Invalid login".to_string()));
    assert_eq!(err.to_string(), "Invalid login");
    assert!(service.accounts().is_empty());
}

#[tokio::test]
async fn silent_bridge_times_out() {
    let bridge = FakeBridge::start(Auth::Silent).await;
    let service = TradingService::new(config(200, 10_000));

    let err = service
        .connect(&bridge.connection(), &credentials())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Connection timeout");
    assert!(service.accounts().is_empty());
}

#[tokio::test]
async fn place_trade_resolves_the_correlated_ticket() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = Arc::new(TradingService::new(ServiceConfig::default()));
    let account = connected(&mut bridge, &service).await;

    let task = {
        let service = service.clone();
        let id = account.id.clone();
        tokio::spawn(async move {
            let request = TradeRequest::market("XAUUSD", Side::Buy, dec!(0.05));
            service.place_trade(&id, &request).await
        })
    };

    let frame = bridge.expect_action("place_order").await;
    assert_eq!(frame["symbol"], "XAUUSD");
    assert_eq!(frame["type"], 0);
    assert_eq!(frame["volume"].as_f64(), Some(0.05));
    assert_eq!(frame["comment"], "PO3 Framework Trade");
    assert!(frame.get("price").is_none());
    assert!(frame.get("sl").is_none());

    let order_id = frame["order_id"].as_str().unwrap().to_string();
    bridge.push(json!({"type": "order_result", "order_id": "someone-else", "success": true, "ticket": 1}));
    bridge.push(json!({"type": "order_result", "order_id": order_id, "success": true, "ticket": 88123}));

    assert_eq!(task.await.unwrap().unwrap(), "88123");
    assert_eq!(service.pending_requests(&account.id), 0);
}

#[tokio::test]
async fn rejected_order_carries_the_bridge_error() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = Arc::new(TradingService::new(ServiceConfig::default()));
    let account = connected(&mut bridge, &service).await;

    let task = {
        let service = service.clone();
        tokio::spawn(async move {
            let request = TradeRequest::market("US30", Side::Sell, dec!(0.1))
                .with_stops(Some(dec!(39100)), Some(dec!(38800)));
            service.place_trade(&account.id, &request).await
        })
    };

    let frame = bridge.expect_action("place_order").await;
    assert_eq!(frame["type"], 1);
    assert_eq!(frame["sl"].as_f64(), Some(39100.0));
    bridge.push(json!({
        "type": "order_result",
        "order_id": frame["order_id"],
        "success": false,
        "error": "Market closed"
    }));

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err, BrokerError::OrderRejected("Market closed".to_string()));
}

#[tokio::test]
async fn unanswered_order_times_out_and_stays_registered() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(config(10_000, 200));
    let account = connected(&mut bridge, &service).await;

    let request = TradeRequest::market("XAUUSD", Side::Buy, dec!(0.01));
    let err = service.place_trade(&account.id, &request).await.unwrap_err();

    assert_eq!(err, BrokerError::Timeout("Order timeout".to_string()));
    assert_eq!(err.to_string(), "Order timeout");
    assert_eq!(service.pending_requests(&account.id), 1);
}

#[tokio::test]
async fn close_position_resolves_then_times_out() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = Arc::new(TradingService::new(config(10_000, 1_000)));
    let account = connected(&mut bridge, &service).await;

    let task = {
        let service = service.clone();
        let id = account.id.clone();
        tokio::spawn(async move { service.close_position(&id, "9001").await })
    };
    let frame = bridge.expect_action("close_position").await;
    assert_eq!(frame["ticket"], "9001");
    bridge.push(json!({"type": "close_result", "ticket": 9001, "success": true}));
    assert!(task.await.unwrap().unwrap());

    let err = service.close_position(&account.id, "9002").await.unwrap_err();
    assert_eq!(err.to_string(), "Close position timeout");
}

#[tokio::test]
async fn trading_without_a_channel_is_not_connected() {
    let service = TradingService::new(ServiceConfig::default());
    let request = TradeRequest::market("XAUUSD", Side::Buy, dec!(0.01));

    let err = service.place_trade("nobody", &request).await.unwrap_err();
    assert_eq!(err.to_string(), "Account not connected");
    let err = service.close_position("nobody", "1").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotConnected(_)));
}

#[tokio::test]
async fn streamed_updates_land_in_the_store() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());
    let mut accounts = capture::<AccountUpdate>(&service);
    let mut positions = capture::<PositionsUpdate>(&service);
    let mut orders = capture::<OrdersUpdate>(&service);
    let account = connected(&mut bridge, &service).await;

    bridge.push(json!({
        "type": "account_update",
        "account": {"balance": 5100, "equity": 5150, "margin": 20, "free_margin": 5130, "margin_level": 2575, "profit": 50}
    }));
    let update = next(&mut accounts).await;
    assert_eq!(update.account_id, account.id);
    assert_eq!(update.account.balance, dec!(5100));
    assert_eq!(service.account(&account.id).unwrap().equity, dec!(5150));

    bridge.push(json!({
        "type": "position_update",
        "positions": [
            {"ticket": 9001, "symbol": "XAUUSD", "type": 0, "volume": 0.05, "open_price": 2650,
             "current_price": 2652, "sl": 2645, "tp": 0, "profit": 10, "open_time": 1704706200},
            {"ticket": "9002", "symbol": "US30", "type": 1, "volume": 0.1, "open_price": 39000,
             "current_price": 38990, "profit": 1, "open_time": 1704706300}
        ]
    }));
    let update = next(&mut positions).await;
    assert_eq!(update.positions.len(), 2);
    let stored = service.positions(&account.id);
    assert_eq!(stored[0].id, "9001");
    assert_eq!(stored[0].stop_loss, Some(dec!(2645)));
    assert_eq!(stored[0].take_profit, None);
    assert_eq!(stored[1].side, Side::Sell);

    bridge.push(json!({
        "type": "order_update",
        "orders": [{"ticket": 12, "symbol": "XAUUSD", "type": 4, "volume": 0.02, "price": 2660, "expiration": 0}]
    }));
    let update = next(&mut orders).await;
    assert_eq!(update.orders[0].order_type, OrderType::BuyStop);
    assert_eq!(service.orders(&account.id)[0].status, OrderStatus::Pending);

    bridge.push(json!({"type": "position_update", "positions": []}));
    next(&mut positions).await;
    assert!(service.positions(&account.id).is_empty());
}

#[tokio::test]
async fn repeated_symbol_keeps_only_the_latest_quote() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());
    let mut quotes = capture::<MarketDataUpdate>(&service);
    connected(&mut bridge, &service).await;

    bridge.push(json!({
        "type": "price_update",
        "prices": [{"symbol": "XAUUSD", "bid": 2650.1, "ask": 2650.4, "digits": 2, "point": 0.01}]
    }));
    bridge.push(json!({
        "type": "price_update",
        "prices": [
            {"symbol": "XAUUSD", "bid": 2651, "ask": 2651.3, "digits": 2, "point": 0.01},
            {"symbol": "US30", "bid": 39000, "ask": 39002, "digits": 1, "point": 0.1}
        ]
    }));

    assert_eq!(next(&mut quotes).await.prices.len(), 1);
    assert_eq!(next(&mut quotes).await.prices.len(), 2);

    let gold = service.market_data("XAUUSD").unwrap();
    assert_eq!(gold.bid, dec!(2651));
    assert_eq!(gold.ask, dec!(2651.3));
    assert_eq!(gold.spread, dec!(0.3));
    assert_eq!(service.store().all_market_data().len(), 2);
}

#[tokio::test]
async fn unknown_and_error_frames_surface_as_faults() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());
    let mut faults = capture::<StreamFault>(&service);
    let account = connected(&mut bridge, &service).await;

    bridge.push(json!({"type": "heartbeat"}));
    let fault = next(&mut faults).await;
    assert_eq!(fault.account_id, account.id);
    assert_eq!(fault.message, "unrecognized message type: heartbeat");

    bridge.push(json!({"type": "error", "message": "Trade context busy"}));
    assert_eq!(next(&mut faults).await.message, "bridge reported: Trade context busy");

    bridge.push(json!({"symbol": "XAUUSD"}));
    assert_eq!(next(&mut faults).await.message, "frame has no type tag");
}

#[tokio::test]
async fn failing_listener_does_not_starve_the_next_one() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());
    service.subscribe(|_: &MarketDataUpdate| Err(ListenerError::new("chart not mounted")));
    let mut quotes = capture::<MarketDataUpdate>(&service);
    connected(&mut bridge, &service).await;

    bridge.push(json!({
        "type": "price_update",
        "prices": [{"symbol": "NAS100", "bid": 17500, "ask": 17501.5, "digits": 1, "point": 0.1}]
    }));
    assert_eq!(next(&mut quotes).await.prices[0].symbol, "NAS100");
}

#[tokio::test]
async fn disconnect_removes_account_positions_and_orders() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());
    let mut positions = capture::<PositionsUpdate>(&service);
    let mut orders = capture::<OrdersUpdate>(&service);
    let account = connected(&mut bridge, &service).await;

    bridge.push(json!({
        "type": "position_update",
        "positions": [{"ticket": 1, "symbol": "GER40", "type": 0, "volume": 1, "open_price": 18000}]
    }));
    bridge.push(json!({
        "type": "order_update",
        "orders": [{"ticket": 2, "symbol": "GER40", "type": 3, "volume": 1, "price": 18100}]
    }));
    next(&mut positions).await;
    next(&mut orders).await;
    assert_eq!(service.positions(&account.id).len(), 1);

    assert!(service.disconnect(&account.id));
    assert!(service.account(&account.id).is_none());
    assert!(service.positions(&account.id).is_empty());
    assert!(service.orders(&account.id).is_empty());
    bridge.expect_action(CLOSED).await;

    let request = TradeRequest::market("GER40", Side::Buy, dec!(1));
    let err = service.place_trade(&account.id, &request).await.unwrap_err();
    assert!(matches!(err, BrokerError::NotConnected(_)));
    assert!(!service.disconnect(&account.id));
}

#[tokio::test]
async fn bridge_closing_marks_account_disconnected() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());
    let mut accounts = capture::<AccountUpdate>(&service);
    let account = connected(&mut bridge, &service).await;

    bridge.close();
    let update = next(&mut accounts).await;
    assert!(!update.account.connected);
    assert!(!service.account(&account.id).unwrap().connected);
}

#[tokio::test]
async fn reconnecting_closes_the_previous_socket() {
    let mut first = FakeBridge::start(Auth::Accept).await;
    let mut second = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());

    let account = connected(&mut first, &service).await;
    let again = connected(&mut second, &service).await;
    assert_eq!(account.id, again.id);

    first.expect_action(CLOSED).await;
    assert_eq!(service.accounts().len(), 1);
    assert!(service.account(&account.id).unwrap().connected);
}

#[tokio::test]
async fn disconnect_all_empties_the_registry() {
    let mut bridge = FakeBridge::start(Auth::Accept).await;
    let service = TradingService::new(ServiceConfig::default());
    connected(&mut bridge, &service).await;

    service.disconnect_all();
    assert!(service.accounts().is_empty());
}
