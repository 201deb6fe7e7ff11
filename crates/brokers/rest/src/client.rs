use chrono::Utc;
use po3_core::wire::{non_zero, string_or_number};
use po3_core::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

/// Account payload returned by `GET {host}/api/account`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestAccount {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    pub balance: Decimal,
    #[serde(default)]
    pub equity: Option<Decimal>,
    #[serde(default)]
    pub margin: Option<Decimal>,
    #[serde(default)]
    pub available: Option<Decimal>,
    #[serde(default)]
    pub margin_level: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pl: Option<Decimal>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub leverage: Option<u32>,
}

impl RestAccount {
    /// Normalize into a desk account. Missing or zero figures fall back the
    /// way the gateway documents them: equity and free margin to the
    /// balance, leverage to 1, everything else to 0.
    pub fn into_account(self, connection: &BrokerConnection) -> TradingAccount {
        let balance = self.balance;
        TradingAccount {
            id: format!("{}_{}", connection.id, self.id),
            name: format!("{} - {}", connection.name, self.id),
            broker: connection.name.clone(),
            account_number: self.id,
            account_type: match self.account_type.as_deref() {
                Some("demo") => AccountType::Demo,
                _ => AccountType::Live,
            },
            platform: Platform::Custom,
            balance,
            equity: non_zero(self.equity).unwrap_or(balance),
            margin: self.margin.unwrap_or_default(),
            free_margin: non_zero(self.available).unwrap_or(balance),
            margin_level: self.margin_level.unwrap_or_default(),
            profit: self.unrealized_pl.unwrap_or_default(),
            currency: self.currency,
            leverage: self.leverage.filter(|l| *l != 0).unwrap_or(1),
            connected: true,
            last_update: Utc::now(),
            server: None,
            login: None,
        }
    }
}

/// Thin client for REST broker gateways.
#[derive(Debug, Clone, Default)]
pub struct RestClient {
    http: reqwest::Client,
}

impl RestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the account behind `api_key`. Any non-2xx answer is reported as
    /// a generic connection failure.
    pub async fn fetch_account(&self, host: &str, api_key: &str) -> Result<RestAccount, BrokerError> {
        let url = format!("{}/api/account", host.trim_end_matches('/'));
        info!(url = %url, "Fetching account from broker API");

        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| BrokerError::ConnectionFailed(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Broker API refused account request");
            return Err(BrokerError::ConnectionFailed(
                "Failed to connect to broker API".to_string(),
            ));
        }

        response
            .json::<RestAccount>()
            .await
            .map_err(|e| BrokerError::Protocol(format!("Invalid account payload: {}", e)))
    }

    /// Fetch and normalize in one step.
    pub async fn connect(
        &self,
        connection: &BrokerConnection,
        api_key: &str,
    ) -> Result<TradingAccount, BrokerError> {
        let account = self.fetch_account(&connection.host, api_key).await?;
        Ok(account.into_account(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn connection() -> BrokerConnection {
        BrokerConnection {
            id: "oanda_1".to_string(),
            name: "OANDA".to_string(),
            platform: PlatformKind::Api,
            host: "https://api-fxpractice.oanda.com".to_string(),
            port: Some(443),
        }
    }

    #[test]
    fn test_sparse_payload_falls_back_to_balance() {
        let wire: RestAccount =
            serde_json::from_str(r#"{"id": 101, "type": "demo", "balance": 10000, "currency": "USD"}"#)
                .unwrap();
        let account = wire.into_account(&connection());

        assert_eq!(account.id, "oanda_1_101");
        assert_eq!(account.account_type, AccountType::Demo);
        assert_eq!(account.platform, Platform::Custom);
        assert_eq!(account.equity, dec!(10000));
        assert_eq!(account.free_margin, dec!(10000));
        assert_eq!(account.margin, dec!(0));
        assert_eq!(account.leverage, 1);
    }

    #[test]
    fn test_full_payload_is_kept() {
        let wire: RestAccount = serde_json::from_str(
            r#"{"id":"A-7","type":"live","balance":5000,"equity":5040.5,"margin":120,
                "available":4920.5,"margin_level":4200,"unrealized_pl":40.5,
                "currency":"EUR","leverage":30}"#,
        )
        .unwrap();
        let account = wire.into_account(&connection());

        assert_eq!(account.account_type, AccountType::Live);
        assert_eq!(account.equity, dec!(5040.5));
        assert_eq!(account.free_margin, dec!(4920.5));
        assert_eq!(account.profit, dec!(40.5));
        assert_eq!(account.leverage, 30);
        assert_eq!(account.currency, "EUR");
    }
}
