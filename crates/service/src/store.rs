//! In-memory tables for connected accounts and their streamed state.
//!
//! All tables sit behind one lock so that registering or removing an
//! account touches its handle, positions and orders in a single step.

use po3_core::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type Channel = Arc<dyn AccountChannel>;

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<String, TradingAccount>,
    channels: HashMap<String, Channel>,
    positions: HashMap<String, Vec<Position>>,
    orders: HashMap<String, Vec<Order>>,
    market_data: HashMap<String, MarketData>,
}

/// Everything `Store::remove` took out for one account.
#[derive(Default)]
pub struct Removed {
    pub account: Option<TradingAccount>,
    pub channel: Option<Channel>,
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
}

#[derive(Default)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Insert or replace an account record. Its channel, positions and
    /// orders are left as they are.
    pub fn upsert_account(&self, account: TradingAccount) {
        self.write().accounts.insert(account.id.clone(), account);
    }

    /// Store the channel for a registered account, returning the one it
    /// replaces. The channel is handed back if the account is unknown.
    pub fn attach(&self, account_id: &str, channel: Channel) -> Result<Option<Channel>, Channel> {
        let mut tables = self.write();
        if !tables.accounts.contains_key(account_id) {
            return Err(channel);
        }
        Ok(tables.channels.insert(account_id.to_string(), channel))
    }

    /// Remove an account with its channel, positions and orders.
    pub fn remove(&self, account_id: &str) -> Removed {
        let mut tables = self.write();
        Removed {
            account: tables.accounts.remove(account_id),
            channel: tables.channels.remove(account_id),
            positions: tables.positions.remove(account_id).unwrap_or_default(),
            orders: tables.orders.remove(account_id).unwrap_or_default(),
        }
    }

    // -----------------------------------------------------------------------
    // Stream updates
    // -----------------------------------------------------------------------

    /// Apply a balance snapshot. Returns the updated account, or None if
    /// the account is not registered.
    pub fn apply_snapshot(&self, account_id: &str, snapshot: &AccountSnapshot) -> Option<TradingAccount> {
        let mut tables = self.write();
        let account = tables.accounts.get_mut(account_id)?;
        account.apply_snapshot(snapshot);
        Some(account.clone())
    }

    pub fn mark_disconnected(&self, account_id: &str) -> Option<TradingAccount> {
        let mut tables = self.write();
        let account = tables.accounts.get_mut(account_id)?;
        account.connected = false;
        Some(account.clone())
    }

    /// Replace an account's positions. Updates for unregistered accounts are
    /// dropped and reported as false.
    pub fn replace_positions(&self, account_id: &str, positions: Vec<Position>) -> bool {
        let mut tables = self.write();
        if !tables.accounts.contains_key(account_id) {
            return false;
        }
        tables.positions.insert(account_id.to_string(), positions);
        true
    }

    pub fn replace_orders(&self, account_id: &str, orders: Vec<Order>) -> bool {
        let mut tables = self.write();
        if !tables.accounts.contains_key(account_id) {
            return false;
        }
        tables.orders.insert(account_id.to_string(), orders);
        true
    }

    /// Last write wins per symbol.
    pub fn upsert_prices(&self, prices: &[MarketData]) {
        let mut tables = self.write();
        for price in prices {
            tables.market_data.insert(price.symbol.clone(), price.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn account(&self, account_id: &str) -> Option<TradingAccount> {
        self.read().accounts.get(account_id).cloned()
    }

    /// All accounts, ordered by id.
    pub fn accounts(&self) -> Vec<TradingAccount> {
        self.read().accounts.values().cloned().collect()
    }

    pub fn account_ids(&self) -> Vec<String> {
        self.read().accounts.keys().cloned().collect()
    }

    pub fn channel(&self, account_id: &str) -> Option<Channel> {
        self.read().channels.get(account_id).cloned()
    }

    pub fn positions(&self, account_id: &str) -> Vec<Position> {
        self.read().positions.get(account_id).cloned().unwrap_or_default()
    }

    pub fn orders(&self, account_id: &str) -> Vec<Order> {
        self.read().orders.get(account_id).cloned().unwrap_or_default()
    }

    pub fn market_data(&self, symbol: &str) -> Option<MarketData> {
        self.read().market_data.get(symbol).cloned()
    }

    /// Every quote seen so far, ordered by symbol.
    pub fn all_market_data(&self) -> Vec<MarketData> {
        let mut prices: Vec<MarketData> = self.read().market_data.values().cloned().collect();
        prices.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        prices
    }
}
