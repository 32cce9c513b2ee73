//! `/transactions/sync` client.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{EngineError, ResultEngine};

use super::{ExternalTransaction, FeedPage, FeedProvider};

/// Error codes meaning the item credential must be renewed by the user.
const RELINK_CODES: &[&str] = &["ITEM_LOGIN_REQUIRED", "INVALID_ACCESS_TOKEN", "ITEM_NOT_FOUND"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.plaid.com",
            Self::Development => "https://development.plaid.com",
            Self::Production => "https://production.plaid.com",
        }
    }

    /// Unknown names fall back to the sandbox.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" => Self::Production,
            "development" => Self::Development,
            _ => Self::Sandbox,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: {code}: {message}")]
    Server {
        status: StatusCode,
        code: String,
        message: String,
    },
}

impl From<FeedError> for EngineError {
    fn from(value: FeedError) -> Self {
        match value {
            FeedError::Server { ref code, .. } if RELINK_CODES.contains(&code.as_str()) => {
                EngineError::Credential(value.to_string())
            }
            other => EngineError::ExternalFeed(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PlaidFeed {
    client: Client,
    base_url: String,
    client_id: String,
    secret: String,
    page_size: u32,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    #[serde(default)]
    added: Vec<PlaidTransaction>,
    next_cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct PlaidTransaction {
    transaction_id: String,
    account_id: String,
    #[serde(deserialize_with = "decimal_from_number")]
    amount: Decimal,
    date: String,
    name: String,
    iso_currency_code: Option<String>,
    merchant_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: String,
    error_message: String,
}

/// JSON numbers are read through their textual form so `12.34` stays exact.
fn decimal_from_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(serde::de::Error::custom)
}

impl From<PlaidTransaction> for ExternalTransaction {
    fn from(tx: PlaidTransaction) -> Self {
        Self {
            external_transaction_id: tx.transaction_id,
            external_account_id: tx.account_id,
            amount: tx.amount,
            date: tx.date,
            description: tx.name,
            currency_code: tx.iso_currency_code,
            merchant_name: tx.merchant_name,
        }
    }
}

impl PlaidFeed {
    pub fn new(
        client: Client,
        environment: PlaidEnvironment,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self::with_base_url(client, environment.base_url(), client_id, secret)
    }

    /// Point the client at another host, e.g. a local stub.
    pub fn with_base_url(
        client: Client,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            client_id: client_id.into(),
            secret: secret.into(),
            page_size: 500,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn sync(&self, access_token: &str, cursor: Option<&str>) -> Result<SyncResponse, FeedError> {
        let body = SyncRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            access_token,
            cursor: cursor.filter(|c| !c.is_empty()),
            count: self.page_size,
        };
        let resp = self
            .client
            .post(self.url("/transactions/sync"))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<SyncResponse>().await?);
        }
        let (code, message) = match resp.json::<ErrorBody>().await {
            Ok(err) => (err.error_code, err.error_message),
            Err(_) => ("UNKNOWN".to_string(), "feed error".to_string()),
        };
        Err(FeedError::Server {
            status,
            code,
            message,
        })
    }
}

#[async_trait]
impl FeedProvider for PlaidFeed {
    async fn fetch_page(&self, access_token: &str, cursor: Option<&str>) -> ResultEngine<FeedPage> {
        let resp = self.sync(access_token, cursor).await?;
        tracing::debug!(
            added = resp.added.len(),
            has_more = resp.has_more,
            "feed page fetched"
        );
        Ok(FeedPage {
            added: resp.added.into_iter().map(Into::into).collect(),
            next_cursor: resp.next_cursor,
            has_more: resp.has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_response() {
        let raw = r#"{
            "added": [{
                "transaction_id": "tx-1",
                "account_id": "acc-1",
                "amount": 12.34,
                "date": "2024-03-01",
                "name": "Coffee",
                "iso_currency_code": "USD",
                "merchant_name": null,
                "pending": false
            }],
            "modified": [],
            "removed": [],
            "next_cursor": "c-1",
            "has_more": false
        }"#;
        let resp: SyncResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.next_cursor, "c-1");
        let tx = ExternalTransaction::from(resp.added.into_iter().next().unwrap());
        assert_eq!(tx.amount, Decimal::new(1234, 2));
        assert_eq!(tx.merchant_name, None);
        assert_eq!(tx.currency_code.as_deref(), Some("USD"));
    }

    #[test]
    fn relink_codes_are_credential_errors() {
        let err = FeedError::Server {
            status: StatusCode::BAD_REQUEST,
            code: "ITEM_LOGIN_REQUIRED".to_string(),
            message: "login required".to_string(),
        };
        assert!(matches!(EngineError::from(err), EngineError::Credential(_)));

        let err = FeedError::Server {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: "RATE_LIMIT_EXCEEDED".to_string(),
            message: "slow down".to_string(),
        };
        assert!(matches!(EngineError::from(err), EngineError::ExternalFeed(_)));
    }

    #[test]
    fn unknown_environment_is_sandbox() {
        assert_eq!(PlaidEnvironment::from_name("staging"), PlaidEnvironment::Sandbox);
        assert_eq!(
            PlaidEnvironment::from_name("Production").base_url(),
            "https://production.plaid.com"
        );
    }
}
