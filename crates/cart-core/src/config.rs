//! # Checkout Configuration

use crate::money::Currency;
use std::time::Duration;

/// Default time the gateway gets to confirm its UI is showing
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a confirmed widget gets to report a result
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Engine settings
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Currency every cart line must be priced in
    pub currency: Currency,

    /// How long `AwaitingGateway` waits for confirmation before `TimedOut`
    pub ready_timeout: Duration,

    /// How long a confirmed attempt may stay open before `TimedOut`.
    /// The cart is locked for that long at most.
    pub payment_timeout: Duration,

    /// Title shown in the gateway UI
    pub title: String,

    /// Description shown in the gateway UI
    pub description: String,
}

impl CheckoutConfig {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            title: "DevStack Globe".to_string(),
            description: "Templates, marketplace items and consultations".to_string(),
        }
    }

    /// Builder: set ready timeout
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Builder: set payment timeout
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    /// Builder: set gateway title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder: set gateway description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self::new(Currency::USD)
    }
}
