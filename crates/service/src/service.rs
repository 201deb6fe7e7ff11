use po3_brokers_metatrader::{MetaTraderClient, ProtocolError, StreamHandler, StreamUpdate};
use po3_brokers_rest::RestClient;
use po3_core::*;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bus::{EventBus, ListenerResult, Subscription, Topic};
use crate::config::ServiceConfig;
use crate::store::{Channel, Store};

/// Manages broker connections for every account on the desk.
///
/// MT4/MT5 accounts stream through a socket bridge; API accounts are fetched
/// once over REST and carry no live channel.
pub struct TradingService {
    config: ServiceConfig,
    store: Arc<Store>,
    bus: Arc<EventBus>,
    rest: RestClient,
}

impl TradingService {
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_store(config, Arc::new(Store::new()), Arc::new(EventBus::new()))
    }

    pub fn with_store(config: ServiceConfig, store: Arc<Store>, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            store,
            bus,
            rest: RestClient::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Connect an account and register it.
    pub async fn connect(
        &self,
        connection: &BrokerConnection,
        credentials: &Credentials,
    ) -> Result<TradingAccount, BrokerError> {
        let result = match &connection.platform {
            PlatformKind::Mt4 | PlatformKind::Mt5 => self.connect_terminal(connection, credentials).await,
            PlatformKind::Api => self.connect_rest(connection, credentials).await,
            PlatformKind::Other(kind) => Err(BrokerError::UnsupportedPlatform(kind.clone())),
        };
        if let Err(e) = &result {
            warn!(connection = %connection.id, "Failed to connect account: {}", e);
        }
        result
    }

    async fn connect_terminal(
        &self,
        connection: &BrokerConnection,
        credentials: &Credentials,
    ) -> Result<TradingAccount, BrokerError> {
        let Credentials::Terminal {
            login,
            password,
            server,
        } = credentials
        else {
            return Err(BrokerError::InvalidCredentials(format!(
                "{} accounts need a terminal login",
                connection.platform
            )));
        };

        let handshake =
            MetaTraderClient::authenticate(&self.config.metatrader, connection, login, password, server)
                .await?;
        let account = handshake.account.clone();

        // Registered before the reader starts so the first updates find it.
        self.store.upsert_account(account.clone());
        let handler = Arc::new(AccountStream {
            account_id: account.id.clone(),
            store: self.store.clone(),
            bus: self.bus.clone(),
        });
        let client = match handshake.start(&self.config.metatrader, handler) {
            Ok(client) => client,
            Err(e) => {
                if let Some(old) = self.store.remove(&account.id).channel {
                    old.close();
                }
                return Err(e);
            }
        };

        let channel: Channel = Arc::new(client);
        match self.store.attach(&account.id, channel) {
            Ok(Some(previous)) => {
                info!(account_id = %account.id, "Replacing existing connection");
                previous.close();
            }
            Ok(None) => {}
            Err(orphan) => orphan.close(),
        }

        info!(account_id = %account.id, "Connected to {}", connection.name);
        Ok(account)
    }

    async fn connect_rest(
        &self,
        connection: &BrokerConnection,
        credentials: &Credentials,
    ) -> Result<TradingAccount, BrokerError> {
        let Credentials::ApiKey { api_key, .. } = credentials else {
            return Err(BrokerError::InvalidCredentials(
                "API accounts need an API key".to_string(),
            ));
        };

        let account = self.rest.connect(connection, api_key).await?;
        if let Some(old) = self.store.remove(&account.id).channel {
            old.close();
        }
        self.store.upsert_account(account.clone());

        info!(account_id = %account.id, "Connected to {} over REST", connection.name);
        Ok(account)
    }

    /// Drop an account with its positions, orders and channel.
    ///
    /// Returns false if the account was not registered.
    pub fn disconnect(&self, account_id: &str) -> bool {
        let removed = self.store.remove(account_id);
        if let Some(channel) = removed.channel {
            channel.close();
        }
        let known = removed.account.is_some();
        if known {
            info!(account_id, "Account disconnected");
        }
        known
    }

    pub fn disconnect_all(&self) {
        for account_id in self.store.account_ids() {
            self.disconnect(&account_id);
        }
    }

    // -----------------------------------------------------------------------
    // Trading
    // -----------------------------------------------------------------------

    /// Place a market order; resolves with the broker ticket.
    pub async fn place_trade(&self, account_id: &str, request: &TradeRequest) -> Result<String, BrokerError> {
        let channel = self.channel(account_id)?;
        info!(
            account_id,
            symbol = %request.symbol,
            side = ?request.side,
            volume = %request.volume,
            "Placing trade"
        );
        channel.place_order(request).await
    }

    pub async fn close_position(&self, account_id: &str, ticket: &str) -> Result<bool, BrokerError> {
        let channel = self.channel(account_id)?;
        info!(account_id, ticket, "Closing position");
        channel.close_position(ticket).await
    }

    /// Correlated requests still registered on an account's channel.
    pub fn pending_requests(&self, account_id: &str) -> usize {
        self.store
            .channel(account_id)
            .map(|channel| channel.pending_requests())
            .unwrap_or_default()
    }

    fn channel(&self, account_id: &str) -> Result<Channel, BrokerError> {
        self.store
            .channel(account_id)
            .ok_or_else(|| BrokerError::NotConnected(account_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Data access
    // -----------------------------------------------------------------------

    pub fn account(&self, account_id: &str) -> Option<TradingAccount> {
        self.store.account(account_id)
    }

    pub fn accounts(&self) -> Vec<TradingAccount> {
        self.store.accounts()
    }

    pub fn positions(&self, account_id: &str) -> Vec<Position> {
        self.store.positions(account_id)
    }

    pub fn orders(&self, account_id: &str) -> Vec<Order> {
        self.store.orders(account_id)
    }

    pub fn market_data(&self, symbol: &str) -> Option<MarketData> {
        self.store.market_data(symbol)
    }

    pub fn subscribe<E, F>(&self, listener: F) -> Subscription<E>
    where
        E: Topic,
        F: Fn(&E) -> ListenerResult + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe<E: Topic>(&self, subscription: Subscription<E>) -> bool {
        self.bus.unsubscribe(subscription)
    }
}

/// Applies one account's stream to the store, then notifies listeners.
struct AccountStream {
    account_id: String,
    store: Arc<Store>,
    bus: Arc<EventBus>,
}

impl StreamHandler for AccountStream {
    fn on_update(&self, update: StreamUpdate) {
        let account_id = self.account_id.clone();
        match update {
            StreamUpdate::Account(snapshot) => {
                if let Some(account) = self.store.apply_snapshot(&account_id, &snapshot) {
                    self.bus.publish(&AccountUpdate { account_id, account });
                }
            }
            StreamUpdate::Positions(positions) => {
                if self.store.replace_positions(&account_id, positions.clone()) {
                    self.bus.publish(&PositionsUpdate {
                        account_id,
                        positions,
                    });
                }
            }
            StreamUpdate::Orders(orders) => {
                if self.store.replace_orders(&account_id, orders.clone()) {
                    self.bus.publish(&OrdersUpdate { account_id, orders });
                }
            }
            StreamUpdate::Prices(prices) => {
                self.store.upsert_prices(&prices);
                self.bus.publish(&MarketDataUpdate { prices });
            }
        }
    }

    fn on_fault(&self, error: ProtocolError) {
        warn!(account_id = %self.account_id, "Stream fault: {}", error);
        self.bus.publish(&StreamFault {
            account_id: self.account_id.clone(),
            message: error.to_string(),
        });
    }

    fn on_closed(&self) {
        if let Some(account) = self.store.mark_disconnected(&self.account_id) {
            info!(account_id = %self.account_id, "Broker stream closed");
            self.bus.publish(&AccountUpdate {
                account_id: self.account_id.clone(),
                account,
            });
        }
    }
}
