//! A scripted MetaTrader socket bridge on a loopback port.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use po3_core::*;
use po3_service::{ServiceConfig, Topic, TradingService};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Frame the bridge records once the desk side has gone away.
pub const CLOSED: &str = "__closed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Accept,
    Reject,
    Silent,
}

pub struct FakeBridge {
    pub port: u16,
    frames: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<Message>,
}

impl FakeBridge {
    pub async fn start(auth: Auth) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (push, mut push_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            loop {
                tokio::select! {
                    incoming = source.next() => {
                        let Some(Ok(Message::Text(text))) = incoming else { break };
                        let frame: Value = serde_json::from_str(&text).unwrap();
                        if frame["action"] == "authenticate" {
                            let reply = match auth {
                                Auth::Accept => Some(account_info()),
                                Auth::Reject => Some(json!({"type": "error", "message": "Invalid login"})),
                                Auth::Silent => None,
                            };
                            if let Some(reply) = reply {
                                let _ = sink.send(Message::Text(reply.to_string())).await;
                            }
                        }
                        let _ = frames_tx.send(frame);
                    }
                    outgoing = push_rx.recv() => {
                        let Some(msg) = outgoing else { break };
                        let closing = matches!(msg, Message::Close(_));
                        if sink.send(msg).await.is_err() || closing {
                            break;
                        }
                    }
                }
            }
            let _ = frames_tx.send(json!({ "action": CLOSED }));
        });

        Self { port, frames, push }
    }

    pub fn connection(&self) -> BrokerConnection {
        BrokerConnection {
            id: "ftmo_1".to_string(),
            name: "FTMO".to_string(),
            platform: PlatformKind::Mt5,
            host: "127.0.0.1".to_string(),
            port: Some(self.port),
        }
    }

    pub fn push(&self, frame: Value) {
        self.push.send(Message::Text(frame.to_string())).unwrap();
    }

    pub fn close(&self) {
        self.push.send(Message::Close(None)).unwrap();
    }

    /// Wait for the next frame with the given action, skipping others.
    pub async fn expect_action(&mut self, action: &str) -> Value {
        loop {
            let frame = timeout(Duration::from_secs(5), self.frames.recv())
                .await
                .expect("bridge saw nothing in time")
                .expect("bridge stopped");
            if frame["action"] == action {
                return frame;
            }
        }
    }
}

pub fn account_info() -> Value {
    json!({
        "type": "account_info",
        "account": {
            "balance": 5000,
            "equity": 5000,
            "margin": 0,
            "free_margin": 5000,
            "margin_level": 0,
            "profit": 0,
            "currency": "USD",
            "leverage": 100,
            "demo": true
        }
    })
}

pub fn credentials() -> Credentials {
    Credentials::Terminal {
        login: "5001".to_string(),
        password: "secret".to_string(),
        server: "FTMO-Demo".to_string(),
    }
}

pub fn config(connect_timeout_ms: u64, request_timeout_ms: u64) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.metatrader.connect_timeout_ms = connect_timeout_ms;
    config.metatrader.request_timeout_ms = request_timeout_ms;
    config
}

/// Forward every event of one topic into a channel.
pub fn capture<E: Topic + Clone>(service: &TradingService) -> mpsc::UnboundedReceiver<E> {
    let (tx, rx) = mpsc::unbounded_channel();
    service.subscribe(move |event: &E| {
        let _ = tx.send(event.clone());
        Ok(())
    });
    rx
}

pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event in time")
        .expect("listener dropped")
}

/// Connect the bridge's account and drain the handshake frames.
pub async fn connected(bridge: &mut FakeBridge, service: &TradingService) -> TradingAccount {
    let account = service
        .connect(&bridge.connection(), &credentials())
        .await
        .unwrap();
    bridge.expect_action("subscribe").await;
    account
}
