//! # Order Ledger
//!
//! Append-only record of completed purchases of bookable services.
//! Written only after the gateway has reported a successful payment.

use crate::error::CartResult;
use crate::item::{CartItem, ItemKind};
use crate::money::Price;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Status of a ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Completed,
}

/// Consultation category shown to the team handling the booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationCategory {
    /// Support for an already purchased product
    Product,
    General,
}

impl ConsultationCategory {
    pub fn from_item_name(name: &str) -> Self {
        if name.contains("Product Support") {
            ConsultationCategory::Product
        } else {
            ConsultationCategory::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationCategory::Product => "product",
            ConsultationCategory::General => "general",
        }
    }
}

/// One purchased booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Authenticated user id
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Item kind that produced the record
    pub kind: ItemKind,

    pub category: ConsultationCategory,

    pub item_id: String,

    pub item_name: String,

    /// Price paid for the booking
    pub amount: Price,

    /// Checkout transaction reference
    pub reference: String,

    pub status: LedgerStatus,

    pub recorded_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Record for a paid line
    pub fn for_item(
        item: &CartItem,
        user_id: impl Into<String>,
        email: Option<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            kind: item.kind.clone(),
            category: ConsultationCategory::from_item_name(&item.name),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            amount: item.price,
            reference: reference.into(),
            status: LedgerStatus::Completed,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only purchase ledger
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn append(&self, record: &LedgerRecord) -> CartResult<()>;
}

/// Type alias for a shared ledger
pub type BoxedOrderLedger = Arc<dyn OrderLedger>;

/// Ledger kept in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    records: Arc<Mutex<Vec<LedgerRecord>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<LedgerRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl OrderLedger for MemoryLedger {
    async fn append(&self, record: &LedgerRecord) -> CartResult<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
