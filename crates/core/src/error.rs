/// Errors that can occur while talking to a broker.
///
/// Every variant renders a message suitable for a user-facing notification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrokerError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    ConnectionFailed(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Timeout(String),
    #[error("Account not connected")]
    NotConnected(String),
    #[error("Order rejected: {0}")]
    OrderRejected(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Broker error: {0}")]
    Other(String),
}

/// A listener could not handle an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_messages_pass_through() {
        assert_eq!(
            BrokerError::ConnectionFailed("Failed to connect to broker API".into()).to_string(),
            "Failed to connect to broker API"
        );
        assert_eq!(BrokerError::Authentication("Invalid login".into()).to_string(), "Invalid login");
        assert_eq!(BrokerError::Timeout("Order timeout".into()).to_string(), "Order timeout");
        assert_eq!(BrokerError::NotConnected("a".into()).to_string(), "Account not connected");
    }
}
