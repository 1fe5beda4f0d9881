//! # Hosted Ledger
//!
//! Appends ledger records as rows of a hosted Postgres REST table
//! (`POST {url}/rest/v1/{table}`).

use crate::config::LedgerConfig;
use async_trait::async_trait;
use cart_core::{CartError, CartResult, LedgerRecord, OrderLedger};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, instrument};

/// Row layout of the purchases table
#[derive(Debug, Clone, Serialize)]
pub struct LedgerRow {
    pub user_id: String,
    pub consultation_type: String,
    /// Decimal amount in the record's currency
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub tx_ref: String,
    pub item_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerRecord> for LedgerRow {
    fn from(record: &LedgerRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            consultation_type: record.category.as_str().to_string(),
            amount: record.amount.as_decimal(),
            currency: record.amount.currency.to_string(),
            status: "completed".to_string(),
            tx_ref: record.reference.clone(),
            item_name: record.item_name.clone(),
            created_at: record.recorded_at,
        }
    }
}

/// REST-backed order ledger
pub struct RestLedger {
    config: LedgerConfig,
    client: Client,
}

impl RestLedger {
    pub fn new(config: LedgerConfig) -> CartResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| CartError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> CartResult<Self> {
        Self::new(LedgerConfig::from_env()?)
    }
}

#[async_trait]
impl OrderLedger for RestLedger {
    #[instrument(skip(self, record), fields(tx_ref = %record.reference, item_id = %record.item_id))]
    async fn append(&self, record: &LedgerRecord) -> CartResult<()> {
        let row = LedgerRow::from(record);

        let response = self
            .client
            .post(self.config.endpoint())
            .header("apikey", &self.config.api_key)
            .header("Authorization", self.config.auth_header())
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|e| CartError::Storage(format!("ledger request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Ledger API error: status={}, body={}", status, body);
            return Err(CartError::Storage(format!(
                "ledger returned {}: {}",
                status, body
            )));
        }

        debug!(table = %self.config.table, "Ledger row appended");
        Ok(())
    }
}
