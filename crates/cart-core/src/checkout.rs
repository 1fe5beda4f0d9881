//! # Checkout Types
//!
//! Transaction references, attempt snapshots and the phases an attempt moves
//! through:
//!
//! ```text
//! Idle ─initiate─▶ Initiating ─gateway opened─▶ AwaitingGateway
//!                      │                          ├─ success ──▶ Succeeded
//!                      └─ open failed ─▶ Failed   ├─ failure ──▶ Failed
//!                                                 ├─ dismissed ▶ Cancelled
//!                                                 └─ no confirm before timeout ▶ TimedOut
//! ```
//!
//! Any terminal phase goes back to `Idle` on reset.

use crate::error::CartError;
use crate::item::CartItem;
use crate::money::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlates gateway callbacks with the attempt that opened the gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    /// Time-based prefix plus random suffix
    pub fn mint() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "tx-{}-{}",
            Utc::now().timestamp_millis(),
            &suffix[..12]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phase of the checkout state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    Initiating,
    AwaitingGateway,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl CheckoutPhase {
    /// An attempt is open and owns the cart
    pub fn is_active(&self) -> bool {
        matches!(self, CheckoutPhase::Initiating | CheckoutPhase::AwaitingGateway)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutPhase::Succeeded
                | CheckoutPhase::Failed
                | CheckoutPhase::Cancelled
                | CheckoutPhase::TimedOut
        )
    }
}

impl Default for CheckoutPhase {
    fn default() -> Self {
        CheckoutPhase::Idle
    }
}

/// Payer details passed to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub name: String,
}

/// What the gateway handed back on success
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Gateway's own transaction id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Gateway's reference for the charge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,

    /// Amount the gateway says it charged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Price>,

    /// Raw callback payload (for support)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// Snapshot of the cart and payer taken when checkout starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutAttempt {
    pub reference: TransactionRef,
    pub amount: Price,
    pub customer: Customer,
    pub user_id: String,
    pub items: Vec<CartItem>,
    pub started_at: DateTime<Utc>,
}

/// How an attempt ended
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Payment taken; the cart was cleared. `warnings` holds ledger write failures.
    Succeeded {
        reference: TransactionRef,
        receipt: PaymentReceipt,
        warnings: Vec<CartError>,
    },
    /// Gateway could not be opened or declined the payment
    Failed {
        reference: TransactionRef,
        error: CartError,
    },
    Cancelled {
        reference: TransactionRef,
    },
    /// No gateway confirmation in time; payment state unknown
    TimedOut {
        reference: TransactionRef,
    },
}

impl CheckoutOutcome {
    pub fn phase(&self) -> CheckoutPhase {
        match self {
            CheckoutOutcome::Succeeded { .. } => CheckoutPhase::Succeeded,
            CheckoutOutcome::Failed { .. } => CheckoutPhase::Failed,
            CheckoutOutcome::Cancelled { .. } => CheckoutPhase::Cancelled,
            CheckoutOutcome::TimedOut { .. } => CheckoutPhase::TimedOut,
        }
    }

    pub fn reference(&self) -> &TransactionRef {
        match self {
            CheckoutOutcome::Succeeded { reference, .. }
            | CheckoutOutcome::Failed { reference, .. }
            | CheckoutOutcome::Cancelled { reference }
            | CheckoutOutcome::TimedOut { reference } => reference,
        }
    }

    /// The error to surface, if any
    pub fn error(&self) -> Option<CartError> {
        match self {
            CheckoutOutcome::Succeeded { .. } => None,
            CheckoutOutcome::Failed { error, .. } => Some(error.clone()),
            CheckoutOutcome::Cancelled { .. } => Some(CartError::Cancelled),
            CheckoutOutcome::TimedOut { reference } => Some(CartError::TimedOut {
                reference: reference.to_string(),
            }),
        }
    }

    pub fn warnings(&self) -> &[CartError] {
        match self {
            CheckoutOutcome::Succeeded { warnings, .. } => warnings,
            _ => &[],
        }
    }
}

/// Observable checkout state (for spinners and status endpoints)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutStatus {
    pub phase: CheckoutPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Price>,

    /// Gateway confirmed its UI is showing
    #[serde(default)]
    pub confirmed: bool,

    /// Shopper-facing message for the current phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Non-fatal problems (ledger writes)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CheckoutStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn active(phase: CheckoutPhase, attempt: &CheckoutAttempt, confirmed: bool) -> Self {
        Self {
            phase,
            reference: Some(attempt.reference.to_string()),
            amount: Some(attempt.amount),
            confirmed,
            message: None,
            warnings: Vec::new(),
        }
    }

    pub fn finished(attempt: &CheckoutAttempt, outcome: &CheckoutOutcome) -> Self {
        Self {
            phase: outcome.phase(),
            reference: Some(attempt.reference.to_string()),
            amount: Some(attempt.amount),
            confirmed: false,
            message: outcome.error().map(|e| e.user_message()),
            warnings: outcome.warnings().iter().map(|w| w.user_message()).collect(),
        }
    }
}

/// Result of delivering a gateway signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "disposition", content = "phase")]
pub enum SignalDisposition {
    /// Signal matched the active attempt; the attempt is now in this phase
    Applied(CheckoutPhase),
    /// Stale, duplicate or unknown reference; nothing changed
    Ignored,
}
