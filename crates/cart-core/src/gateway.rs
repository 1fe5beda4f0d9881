//! # Payment Gateway Trait
//!
//! The engine talks to payment providers only through [`PaymentGateway`].
//! The provider's wire protocol, script loading and key negotiation belong
//! to the adapter.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 PaymentGateway (trait)                   │
//! │  ├── open(request, callbacks) -> GatewayHandle           │
//! │  └── provider_name()                                     │
//! └──────────────────────────────────────────────────────────┘
//!                  │ callbacks.confirmed()/succeeded()/failed()/cancelled()
//!                  ▼
//!          CartEngine (matches on TransactionRef)
//! ```

use crate::checkout::{Customer, PaymentReceipt, SignalDisposition, TransactionRef};
use crate::error::CartResult;
use crate::money::Price;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a gateway needs to open a payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub reference: TransactionRef,
    pub amount: Price,
    pub customer: Customer,
    /// Title shown in the gateway UI
    pub title: String,
    /// Short description shown in the gateway UI
    pub description: String,
}

/// Signals a gateway reports for an open payment
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// Gateway UI is showing; disarms the ready timeout
    Confirmed,
    Succeeded(PaymentReceipt),
    Failed { reason: String },
    /// Shopper closed the gateway UI
    Cancelled,
}

/// Receiver of gateway signals (implemented by the engine)
#[async_trait]
pub trait GatewaySignalSink: Send + Sync {
    async fn deliver(&self, reference: &TransactionRef, event: GatewayEvent) -> SignalDisposition;
}

/// Callbacks bound to one attempt's reference
#[derive(Clone)]
pub struct GatewayCallbacks {
    reference: TransactionRef,
    sink: Arc<dyn GatewaySignalSink>,
}

impl GatewayCallbacks {
    pub fn new(reference: TransactionRef, sink: Arc<dyn GatewaySignalSink>) -> Self {
        Self { reference, sink }
    }

    pub fn reference(&self) -> &TransactionRef {
        &self.reference
    }

    pub async fn confirmed(&self) -> SignalDisposition {
        self.sink.deliver(&self.reference, GatewayEvent::Confirmed).await
    }

    pub async fn succeeded(&self, receipt: PaymentReceipt) -> SignalDisposition {
        self.sink
            .deliver(&self.reference, GatewayEvent::Succeeded(receipt))
            .await
    }

    pub async fn failed(&self, reason: impl Into<String>) -> SignalDisposition {
        self.sink
            .deliver(
                &self.reference,
                GatewayEvent::Failed {
                    reason: reason.into(),
                },
            )
            .await
    }

    pub async fn cancelled(&self) -> SignalDisposition {
        self.sink.deliver(&self.reference, GatewayEvent::Cancelled).await
    }
}

impl std::fmt::Debug for GatewayCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCallbacks")
            .field("reference", &self.reference)
            .finish()
    }
}

/// Handle to an opened gateway payment
pub trait GatewayHandle: Send + Sync {
    /// Data the client needs to render the gateway UI
    fn client_payload(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Whether [`GatewayHandle::close`] does anything
    fn supports_close(&self) -> bool {
        false
    }

    /// Close the gateway UI
    fn close(&self) {}
}

/// Core trait for payment gateway adapters.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open the gateway for `request`.
    ///
    /// An `Err` means the gateway is unavailable (script failed to load,
    /// missing key). Results arrive later through `callbacks`.
    async fn open(
        &self,
        request: &PaymentRequest,
        callbacks: GatewayCallbacks,
    ) -> CartResult<Box<dyn GatewayHandle>>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
