//! # Cart Error Types
//!
//! Typed error handling for the storefront cart engine.
//! All cart and checkout operations return `Result<T, CartError>`.

use thiserror::Error;

/// Core error type for cart mutations and checkout attempts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Bad `add_item` input; the cart is left unchanged
    #[error("Validation error: {0}")]
    Validation(String),

    /// Checkout needs an authenticated identity
    #[error("Authentication required to check out")]
    AuthRequired,

    /// Checkout on an empty cart
    #[error("Cart is empty")]
    EmptyCart,

    /// Another checkout attempt is still active
    #[error("Checkout already in progress: {reference}")]
    CheckoutInProgress { reference: String },

    /// Gateway script or service could not be opened
    #[error("Payment gateway unavailable: {0}")]
    GatewayInit(String),

    /// Gateway reported an explicit failure
    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    /// Shopper dismissed the gateway UI
    #[error("Checkout cancelled")]
    Cancelled,

    /// Gateway never confirmed its modal before the ready timeout
    #[error("Checkout timed out waiting for the payment gateway: {reference}")]
    TimedOut { reference: String },

    /// Ledger append failed after a successful payment (non-fatal)
    #[error("Ledger write failed for {reference}: {message}")]
    LedgerWrite { reference: String, message: String },

    /// Catalog lookup failed or the item is not for sale
    #[error("Item not found: {id}")]
    ItemNotFound { id: String },

    /// Cart persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors (missing keys, invalid values)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CartError {
    /// Returns true if the shopper can simply try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CartError::GatewayInit(_)
                | CartError::PaymentDeclined { .. }
                | CartError::Cancelled
                | CartError::TimedOut { .. }
                | CartError::Storage(_)
        )
    }

    /// Returns true for errors that must not be styled as failures
    pub fn is_soft(&self) -> bool {
        matches!(self, CartError::Cancelled | CartError::LedgerWrite { .. })
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CartError::Validation(_) => 400,
            CartError::AuthRequired => 401,
            CartError::EmptyCart => 422,
            CartError::CheckoutInProgress { .. } => 409,
            CartError::GatewayInit(_) => 502,
            CartError::PaymentDeclined { .. } => 402,
            CartError::Cancelled => 200,
            CartError::TimedOut { .. } => 504,
            CartError::LedgerWrite { .. } => 200,
            CartError::ItemNotFound { .. } => 404,
            CartError::Storage(_) => 503,
            CartError::Serialization(_) => 500,
            CartError::Configuration(_) => 500,
            CartError::Internal(_) => 500,
        }
    }

    /// Shopper-facing message
    pub fn user_message(&self) -> String {
        match self {
            CartError::Validation(msg) => format!("That item could not be added: {}", msg),
            CartError::AuthRequired => "Please log in to complete checkout.".to_string(),
            CartError::EmptyCart => "Your cart is empty.".to_string(),
            CartError::CheckoutInProgress { .. } => {
                "A payment is already in progress. Please finish or close it first.".to_string()
            }
            CartError::GatewayInit(_) => {
                "The payment service could not be loaded. Please try again.".to_string()
            }
            CartError::PaymentDeclined { reason } => format!(
                "Your payment was not completed ({}). Your cart has been kept so you can retry.",
                reason
            ),
            CartError::Cancelled => "Checkout closed. Your cart is unchanged.".to_string(),
            CartError::TimedOut { reference } => format!(
                "We could not confirm the payment window opened, so the payment state is \
                 uncertain. Check your statement before retrying (reference {}).",
                reference
            ),
            CartError::LedgerWrite { reference, .. } => format!(
                "Your payment went through, but we could not record your booking yet \
                 (reference {}). Our team will follow up.",
                reference
            ),
            CartError::ItemNotFound { .. } => "That item is no longer available.".to_string(),
            CartError::Storage(_) => "Your cart could not be saved. Please try again.".to_string(),
            CartError::Serialization(_)
            | CartError::Configuration(_)
            | CartError::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<serde_json::Error> for CartError {
    fn from(err: serde_json::Error) -> Self {
        CartError::Serialization(err.to_string())
    }
}

/// Result type alias for cart operations
pub type CartResult<T> = Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CartError::GatewayInit("script blocked".into()).is_retryable());
        assert!(CartError::TimedOut {
            reference: "tx-1".into()
        }
        .is_retryable());
        assert!(!CartError::AuthRequired.is_retryable());
        assert!(!CartError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CartError::Validation("x".into()).status_code(), 400);
        assert_eq!(CartError::AuthRequired.status_code(), 401);
        assert_eq!(
            CartError::CheckoutInProgress {
                reference: "tx".into()
            }
            .status_code(),
            409
        );
        assert_eq!(
            CartError::PaymentDeclined {
                reason: "insufficient funds".into()
            }
            .status_code(),
            402
        );
    }

    #[test]
    fn test_timed_out_message_is_uncertain() {
        let msg = CartError::TimedOut {
            reference: "tx-9".into(),
        }
        .user_message();
        assert!(msg.contains("uncertain"));
        assert!(msg.contains("tx-9"));
    }

    #[test]
    fn test_soft_errors() {
        assert!(CartError::Cancelled.is_soft());
        assert!(!CartError::EmptyCart.is_soft());
    }
}
