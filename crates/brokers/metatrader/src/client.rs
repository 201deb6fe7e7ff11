use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use po3_core::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::normalize::{self, LoginContext};
use crate::protocol::{self, InboundFrame, OutboundFrame, ProtocolError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for talking to a MetaTrader socket bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaTraderConfig {
    /// Port used when a connection does not name one.
    pub default_port: u16,
    /// Budget for open + authenticate + account_info.
    pub connect_timeout_ms: u64,
    /// Budget for a correlated place/close reply.
    pub request_timeout_ms: u64,
    /// Update kinds requested once the account is live.
    pub subscriptions: Vec<String>,
    /// Comment attached to trades that do not carry one.
    pub default_comment: String,
}

impl Default for MetaTraderConfig {
    fn default() -> Self {
        Self {
            default_port: 8080,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 10_000,
            subscriptions: ["account", "positions", "orders", "prices"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_comment: "PO3 Framework Trade".to_string(),
        }
    }
}

impl MetaTraderConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn url(&self, host: &str, port: Option<u16>) -> String {
        format!("ws://{}:{}", host, port.unwrap_or(self.default_port))
    }
}

/// A streamed update, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Account(AccountSnapshot),
    Positions(Vec<Position>),
    Orders(Vec<Order>),
    Prices(Vec<MarketData>),
}

/// Receives everything the reader task decodes that is not a correlated reply.
pub trait StreamHandler: Send + Sync + 'static {
    fn on_update(&self, update: StreamUpdate);

    fn on_fault(&self, error: ProtocolError);

    /// The bridge closed the socket or the read side failed.
    fn on_closed(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Correlation {
    Order(String),
    Close(String),
}

/// Waiters for correlated replies, keyed by order id or ticket.
#[derive(Default)]
struct PendingRequests {
    waiters: HashMap<Correlation, Vec<oneshot::Sender<InboundFrame>>>,
}

impl PendingRequests {
    fn register(&mut self, key: Correlation) -> oneshot::Receiver<InboundFrame> {
        let (tx, rx) = oneshot::channel();
        self.waiters.entry(key).or_default().push(tx);
        rx
    }

    fn remove(&mut self, key: &Correlation) {
        self.waiters.remove(key);
    }

    /// Hand `frame` to every waiter on `key`. Returns false when nobody waits.
    fn resolve(&mut self, key: &Correlation, frame: InboundFrame) -> bool {
        match self.waiters.remove(key) {
            Some(waiters) => {
                for tx in waiters {
                    let _ = tx.send(frame.clone());
                }
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }
}

type SharedPending = Arc<Mutex<PendingRequests>>;

fn lock(pending: &SharedPending) -> std::sync::MutexGuard<'_, PendingRequests> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An authenticated socket whose data stream has not been started.
pub struct Handshake {
    socket: Socket,
    pub account: TradingAccount,
}

impl Handshake {
    /// Start the reader and writer tasks and subscribe to updates.
    pub fn start(
        self,
        config: &MetaTraderConfig,
        handler: Arc<dyn StreamHandler>,
    ) -> Result<MetaTraderClient, BrokerError> {
        let account_id = self.account.id.clone();
        let (mut sink, mut stream) = self.socket.split();
        let (outbound, mut rx) = mpsc::unbounded_channel::<Message>();
        let pending: SharedPending = Arc::default();

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() || closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = pending.clone();
        let reader_account = account_id.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => dispatch(&text, handler.as_ref(), &reader_pending),
                    Ok(Message::Binary(bin)) => match String::from_utf8(bin) {
                        Ok(text) => dispatch(&text, handler.as_ref(), &reader_pending),
                        Err(e) => handler.on_fault(ProtocolError::Malformed(e.to_string())),
                    },
                    Ok(Message::Close(frame)) => {
                        info!(account_id = %reader_account, "MetaTrader bridge closed socket: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(account_id = %reader_account, "MetaTrader socket error: {}", e);
                        break;
                    }
                }
            }
            handler.on_closed();
        });

        let client = MetaTraderClient {
            account_id,
            config: config.clone(),
            outbound,
            pending,
            tasks: Mutex::new(vec![reader, writer]),
        };
        client.send(&OutboundFrame::Subscribe {
            types: config.subscriptions.clone(),
        })?;
        Ok(client)
    }
}

fn dispatch(text: &str, handler: &dyn StreamHandler, pending: &SharedPending) {
    let frame = match protocol::decode(text) {
        Ok(frame) => frame,
        Err(e) => return handler.on_fault(e),
    };

    match frame {
        InboundFrame::AccountUpdate { account } => {
            handler.on_update(StreamUpdate::Account(normalize::snapshot(&account)))
        }
        InboundFrame::PositionUpdate { positions } => handler.on_update(StreamUpdate::Positions(
            positions.iter().map(normalize::position).collect(),
        )),
        InboundFrame::OrderUpdate { orders } => handler.on_update(StreamUpdate::Orders(
            orders.iter().map(normalize::order).collect(),
        )),
        InboundFrame::PriceUpdate { prices } => handler.on_update(StreamUpdate::Prices(
            prices.iter().map(normalize::market_data).collect(),
        )),
        InboundFrame::OrderResult { ref order_id, .. } => {
            let key = Correlation::Order(order_id.clone());
            if !lock(pending).resolve(&key, frame) {
                debug!(?key, "Dropping uncorrelated order_result");
            }
        }
        InboundFrame::CloseResult { ref ticket, .. } => {
            let key = Correlation::Close(ticket.clone());
            if !lock(pending).resolve(&key, frame) {
                debug!(?key, "Dropping uncorrelated close_result");
            }
        }
        InboundFrame::Error { message } => handler.on_fault(ProtocolError::Remote(message)),
        InboundFrame::AccountInfo { .. } => debug!("Ignoring account_info after handshake"),
        InboundFrame::Unrecognized => {
            handler.on_fault(ProtocolError::UnrecognizedMessage("unknown".to_string()))
        }
    }
}

/// A live connection to one MetaTrader account through the socket bridge.
///
/// Owns the reader/writer tasks of its socket. Trading requests are
/// correlated with their replies by order id (`place_order`) or ticket
/// (`close_position`).
pub struct MetaTraderClient {
    account_id: String,
    config: MetaTraderConfig,
    outbound: mpsc::UnboundedSender<Message>,
    pending: SharedPending,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MetaTraderClient {
    /// Open the socket, authenticate and wait for `account_info`.
    ///
    /// Fails on an `error` frame, on socket failure, or when the connect
    /// timeout elapses, whichever happens first.
    pub async fn authenticate(
        config: &MetaTraderConfig,
        connection: &BrokerConnection,
        login: &str,
        password: &str,
        server: &str,
    ) -> Result<Handshake, BrokerError> {
        let url = config.url(&connection.host, connection.port);
        info!(url = %url, login, "Connecting to MetaTrader bridge");

        let ctx = LoginContext {
            connection,
            login,
            server,
        };
        let auth = OutboundFrame::Authenticate {
            login: login.to_string(),
            password: password.to_string(),
            server: server.to_string(),
        };

        match tokio::time::timeout(config.connect_timeout(), handshake(&url, &auth, &ctx)).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout("Connection timeout".to_string())),
        }
    }

    /// Send a market order and wait for its `order_result`.
    ///
    /// Resolves with the broker ticket.
    pub async fn place_order(&self, request: &TradeRequest) -> Result<String, BrokerError> {
        let order_id = Uuid::new_v4().to_string();
        let key = Correlation::Order(order_id.clone());
        let frame = OutboundFrame::PlaceOrder {
            order_id,
            symbol: request.symbol.clone(),
            side: match request.side {
                Side::Buy => 0,
                Side::Sell => 1,
            },
            volume: request.volume,
            price: request.price,
            sl: request.stop_loss,
            tp: request.take_profit,
            comment: request
                .comment
                .clone()
                .unwrap_or_else(|| self.config.default_comment.clone()),
        };

        match self.request(key, &frame, "Order timeout").await? {
            InboundFrame::OrderResult {
                success: true,
                ticket,
                ..
            } => Ok(ticket.unwrap_or_default()),
            InboundFrame::OrderResult { error, .. } => Err(BrokerError::OrderRejected(
                error.unwrap_or_else(|| "no reason given".to_string()),
            )),
            other => Err(BrokerError::Protocol(format!("unexpected reply: {:?}", other))),
        }
    }

    /// Ask the bridge to close a position and wait for its `close_result`.
    pub async fn close_position(&self, ticket: &str) -> Result<bool, BrokerError> {
        let key = Correlation::Close(ticket.to_string());
        let frame = OutboundFrame::ClosePosition {
            ticket: ticket.to_string(),
        };

        match self.request(key, &frame, "Close position timeout").await? {
            InboundFrame::CloseResult { success, .. } => Ok(success),
            other => Err(BrokerError::Protocol(format!("unexpected reply: {:?}", other))),
        }
    }

    /// Number of correlated requests still registered.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Send a close frame and stop reading. Outstanding requests are left to
    /// run out their own timeout.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reader) = tasks.first() {
            reader.abort();
        }
        info!(account_id = %self.account_id, "Disconnected from MetaTrader");
    }

    fn send(&self, frame: &OutboundFrame) -> Result<(), BrokerError> {
        let text = protocol::encode(frame).map_err(|e| BrokerError::Protocol(e.to_string()))?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| BrokerError::ConnectionFailed("Socket is closed".to_string()))
    }

    async fn request(
        &self,
        key: Correlation,
        frame: &OutboundFrame,
        timeout_message: &str,
    ) -> Result<InboundFrame, BrokerError> {
        let deadline = Instant::now() + self.config.request_timeout();
        let rx = lock(&self.pending).register(key.clone());
        if let Err(e) = self.send(frame) {
            lock(&self.pending).remove(&key);
            return Err(e);
        }

        // A timed-out request keeps its waiter registered; a late reply or
        // dropping the connection releases it.
        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                tokio::time::sleep_until(deadline).await;
                Err(BrokerError::Timeout(timeout_message.to_string()))
            }
            Err(_) => Err(BrokerError::Timeout(timeout_message.to_string())),
        }
    }
}

#[async_trait]
impl AccountChannel for MetaTraderClient {
    async fn place_order(&self, request: &TradeRequest) -> Result<String, BrokerError> {
        MetaTraderClient::place_order(self, request).await
    }

    async fn close_position(&self, ticket: &str) -> Result<bool, BrokerError> {
        MetaTraderClient::close_position(self, ticket).await
    }

    fn pending_requests(&self) -> usize {
        MetaTraderClient::pending_requests(self)
    }

    fn close(&self) {
        MetaTraderClient::close(self)
    }
}

impl Drop for MetaTraderClient {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.iter() {
            task.abort();
        }
    }
}

async fn handshake(
    url: &str,
    auth: &OutboundFrame,
    ctx: &LoginContext<'_>,
) -> Result<Handshake, BrokerError> {
    let (mut socket, _) = connect_async(url)
        .await
        .map_err(|e| BrokerError::ConnectionFailed(format!("WebSocket connect failed: {}", e)))?;

    let text = protocol::encode(auth).map_err(|e| BrokerError::Protocol(e.to_string()))?;
    socket
        .send(Message::Text(text))
        .await
        .map_err(|e| BrokerError::ConnectionFailed(format!("Write error: {}", e)))?;

    while let Some(msg) = socket.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(BrokerError::ConnectionFailed(format!("Read error: {}", e))),
        };
        match protocol::decode(&text) {
            Ok(InboundFrame::AccountInfo { account }) => {
                let account = normalize::account_from_info(ctx, &account);
                info!(account_id = %account.id, "Authenticated with MetaTrader bridge");
                return Ok(Handshake { socket, account });
            }
            Ok(InboundFrame::Error { message }) => return Err(BrokerError::Authentication(message)),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Ignoring frame during handshake"),
        }
    }

    Err(BrokerError::ConnectionFailed(
        "Socket closed before account_info".to_string(),
    ))
}
