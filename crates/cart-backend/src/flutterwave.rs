//! # Flutterwave Inline Checkout
//!
//! Gateway adapter for the Flutterwave inline (v3.js) widget.
//!
//! `open` builds the widget configuration the browser passes to
//! `FlutterwaveCheckout(...)` and registers the attempt's callbacks under its
//! `tx_ref`. The browser then reports widget events back through the API,
//! which hands them to [`FlutterwaveInlineGateway::dispatch`].

use crate::config::FlutterwaveConfig;
use async_trait::async_trait;
use cart_core::{
    CartError, CartResult, Currency, GatewayCallbacks, GatewayEvent, GatewayHandle,
    PaymentGateway, PaymentReceipt, PaymentRequest, Price, SignalDisposition, TransactionRef,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// Script the browser loads before opening the widget
pub const CHECKOUT_SCRIPT_URL: &str = "https://checkout.flutterwave.com/v3.js";

type Registry = Arc<Mutex<HashMap<TransactionRef, GatewayCallbacks>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<TransactionRef, GatewayCallbacks>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Flutterwave inline widget strategy
pub struct FlutterwaveInlineGateway {
    config: FlutterwaveConfig,
    pending: Registry,
}

impl FlutterwaveInlineGateway {
    pub fn new(config: FlutterwaveConfig) -> Self {
        Self {
            config,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> CartResult<Self> {
        let config = FlutterwaveConfig::from_env()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &FlutterwaveConfig {
        &self.config
    }

    /// Number of attempts waiting for widget events
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Build the object passed to `FlutterwaveCheckout(...)`
    pub fn widget_config(&self, request: &PaymentRequest) -> Value {
        let mut customer = Map::new();
        customer.insert("email".into(), Value::from(request.customer.email.clone()));
        customer.insert("name".into(), Value::from(request.customer.name.clone()));

        let mut customizations = Map::new();
        customizations.insert("title".into(), Value::from(request.title.clone()));
        customizations.insert("description".into(), Value::from(request.description.clone()));
        if let Some(logo) = &self.config.logo_url {
            customizations.insert("logo".into(), Value::from(logo.clone()));
        }

        let mut widget = Map::new();
        widget.insert(
            self.config.key_field.as_str().into(),
            Value::from(self.config.public_key.clone()),
        );
        widget.insert("tx_ref".into(), Value::from(request.reference.to_string()));
        widget.insert("amount".into(), Value::from(request.amount.as_decimal()));
        widget.insert(
            "currency".into(),
            Value::from(request.amount.currency.to_string()),
        );
        widget.insert(
            "payment_options".into(),
            Value::from(self.config.payment_options.clone()),
        );
        widget.insert("customer".into(), Value::Object(customer));
        widget.insert("customizations".into(), Value::Object(customizations));
        if let Some(url) = &self.config.redirect_url {
            widget.insert("redirect_url".into(), Value::from(url.clone()));
        }

        Value::Object(widget)
    }

    /// Route a widget event to the attempt that opened it.
    ///
    /// Unknown or already settled references are ignored.
    #[instrument(skip(self, event), fields(tx_ref = %reference))]
    pub async fn dispatch(&self, reference: &TransactionRef, event: GatewayEvent) -> SignalDisposition {
        let terminal = event != GatewayEvent::Confirmed;
        let callbacks = {
            let mut pending = lock(&self.pending);
            if terminal {
                pending.remove(reference)
            } else {
                pending.get(reference).cloned()
            }
        };

        let Some(callbacks) = callbacks else {
            warn!("Widget event for unknown tx_ref");
            return SignalDisposition::Ignored;
        };

        match event {
            GatewayEvent::Confirmed => callbacks.confirmed().await,
            GatewayEvent::Succeeded(receipt) => callbacks.succeeded(receipt).await,
            GatewayEvent::Failed { reason } => callbacks.failed(reason).await,
            GatewayEvent::Cancelled => callbacks.cancelled().await,
        }
    }
}

#[async_trait]
impl PaymentGateway for FlutterwaveInlineGateway {
    #[instrument(skip(self, request, callbacks), fields(tx_ref = %request.reference))]
    async fn open(
        &self,
        request: &PaymentRequest,
        callbacks: GatewayCallbacks,
    ) -> CartResult<Box<dyn GatewayHandle>> {
        self.config
            .validate()
            .map_err(|e| CartError::GatewayInit(e.to_string()))?;

        if request.amount.amount <= 0 {
            return Err(CartError::GatewayInit(
                "payment amount must be positive".to_string(),
            ));
        }

        let widget = self.widget_config(request);
        lock(&self.pending).insert(request.reference.clone(), callbacks);

        info!(
            amount = %request.amount,
            key_field = self.config.key_field.as_str(),
            "Prepared Flutterwave widget"
        );

        Ok(Box::new(InlineHandle {
            reference: request.reference.clone(),
            widget,
            pending: self.pending.clone(),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "flutterwave"
    }
}

/// Handle for one prepared widget
struct InlineHandle {
    reference: TransactionRef,
    widget: Value,
    pending: Registry,
}

impl GatewayHandle for InlineHandle {
    fn client_payload(&self) -> Value {
        serde_json::json!({
            "provider": "flutterwave",
            "script_url": CHECKOUT_SCRIPT_URL,
            "config": self.widget,
        })
    }

    fn supports_close(&self) -> bool {
        true
    }

    /// Stop routing widget events for this attempt
    fn close(&self) {
        if lock(&self.pending).remove(&self.reference).is_some() {
            debug!(tx_ref = %self.reference, "Closed Flutterwave widget registration");
        }
    }
}

/// Payload the widget hands to its `callback`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlutterwaveCallback {
    pub status: String,

    #[serde(default)]
    pub tx_ref: Option<String>,

    /// Numeric in v3 responses, string in some older ones
    #[serde(default)]
    pub transaction_id: Option<Value>,

    #[serde(default)]
    pub flw_ref: Option<String>,

    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default)]
    pub currency: Option<String>,
}

impl FlutterwaveCallback {
    pub fn is_successful(&self) -> bool {
        matches!(self.status.as_str(), "successful" | "completed")
    }

    /// Translate into a gateway event, keeping the raw payload on success
    pub fn into_event(self) -> GatewayEvent {
        if !self.is_successful() {
            return GatewayEvent::Failed {
                reason: format!("payment status {}", self.status),
            };
        }

        let raw = serde_json::to_value(&self).ok();
        let currency = self
            .currency
            .as_deref()
            .and_then(|code| code.parse::<Currency>().ok());
        let amount = match (self.amount, currency) {
            (Some(amount), Some(currency)) => Some(Price::new(amount, currency)),
            _ => None,
        };
        let transaction_id = self.transaction_id.map(|id| match id {
            Value::String(s) => s,
            other => other.to_string(),
        });

        GatewayEvent::Succeeded(PaymentReceipt {
            transaction_id,
            gateway_reference: self.flw_ref,
            amount,
            raw,
        })
    }
}
