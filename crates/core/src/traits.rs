use crate::error::BrokerError;
use crate::models::TradeRequest;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Account Channel Trait
// ---------------------------------------------------------------------------

/// The live transport behind one connected account.
///
/// The connection registry holds at most one channel per account id.
#[async_trait]
pub trait AccountChannel: Send + Sync {
    /// Send a market order; resolves with the broker ticket.
    async fn place_order(&self, request: &TradeRequest) -> Result<String, BrokerError>;

    /// Close a position by ticket; resolves with the broker's success flag.
    async fn close_position(&self, ticket: &str) -> Result<bool, BrokerError>;

    /// Correlated requests still waiting on the transport.
    fn pending_requests(&self) -> usize;

    /// Close the transport. Outstanding requests are not cancelled.
    fn close(&self);
}
