use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use po3_core::BrokerError;
use po3_journal::JournalError;
use po3_risk::RiskError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Risk(#[from] RiskError),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Broker(e) => match e {
                BrokerError::UnsupportedPlatform(_) | BrokerError::InvalidCredentials(_) => {
                    StatusCode::BAD_REQUEST
                }
                BrokerError::NotConnected(_) => StatusCode::NOT_FOUND,
                BrokerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Journal(JournalError::IoError(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Risk(_) | ApiError::Journal(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, "Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_errors_map_to_statuses() {
        let cases = [
            (BrokerError::UnsupportedPlatform("cTrader".into()), StatusCode::BAD_REQUEST),
            (BrokerError::InvalidCredentials("x".into()), StatusCode::BAD_REQUEST),
            (BrokerError::NotConnected("a".into()), StatusCode::NOT_FOUND),
            (BrokerError::Timeout("Order timeout".into()), StatusCode::GATEWAY_TIMEOUT),
            (BrokerError::Authentication("bad".into()), StatusCode::BAD_GATEWAY),
            (BrokerError::OrderRejected("closed".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
