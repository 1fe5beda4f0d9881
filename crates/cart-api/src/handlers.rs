//! # Request Handlers
//!
//! Axum request handlers for the cart API.
//! The upstream auth proxy identifies the shopper through request headers.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use cart_backend::FlutterwaveCallback;
use cart_core::{
    CartError, CartItem, CartSnapshot, CatalogStore, CheckoutStatus, GatewayEvent, Identity,
    ItemKind, Price, SignalDisposition, TransactionRef,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

/// Browser session id (always required)
pub const SESSION_HEADER: &str = "x-session-id";
/// Authenticated user id; absent for anonymous shoppers
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add catalog item request
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Set quantity request; zero or less removes the line
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Book a consultation listed in the catalog
#[derive(Debug, Deserialize)]
pub struct BookConsultationRequest {
    pub product_id: String,
}

/// Line added or changed by a request
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub item: CartItem,
    pub cart: CartSnapshot,
}

/// Checkout opened
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub reference: String,
    pub amount: Price,
    pub amount_display: String,
    /// Gateway widget payload for the browser
    pub payment: serde_json::Value,
}

/// Gateway failure report
#[derive(Debug, Default, Deserialize)]
pub struct FailureRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result of a gateway callback
#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub reference: String,
    pub disposition: SignalDisposition,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn cart_error_to_response(err: CartError) -> ApiError {
    let code = err.status_code();
    if code >= 500 {
        error!("Request failed: {}", err);
    }
    let response = ErrorResponse::new(err.to_string(), code).with_details(err.user_message());
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Session id and identity from proxy headers
fn identity_from_headers(headers: &HeaderMap) -> Result<(String, Identity), CartError> {
    let session_id = header_value(headers, SESSION_HEADER)
        .ok_or_else(|| CartError::Validation(format!("{} header required", SESSION_HEADER)))?;

    let identity = match header_value(headers, USER_ID_HEADER) {
        Some(user_id) => Identity {
            authenticated: true,
            subject: user_id,
            email: header_value(headers, USER_EMAIL_HEADER),
            display_name: header_value(headers, USER_NAME_HEADER),
        },
        None => Identity::anonymous(session_id.clone()),
    };

    Ok((session_id, identity))
}

async fn session_engine(state: &AppState, headers: &HeaderMap) -> Result<cart_core::CartEngine, ApiError> {
    let (session_id, identity) = identity_from_headers(headers).map_err(cart_error_to_response)?;
    state
        .engine_for(&session_id, identity)
        .await
        .map_err(cart_error_to_response)
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront-cart",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.session_count().await,
        "pending_payments": state.gateway.pending_count()
    }))
}

// =============================================================================
// Cart
// =============================================================================

/// Current cart and checkout status
pub async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CartSnapshot>, ApiError> {
    let engine = session_engine(&state, &headers).await?;
    Ok(Json(engine.snapshot().await))
}

/// Add a catalog item at its current price
#[instrument(skip(state, headers, request), fields(product_id = %request.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let engine = session_engine(&state, &headers).await?;
    let item = engine
        .add_from_catalog(&request.product_id, request.quantity)
        .await
        .map_err(cart_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(ItemResponse {
            item,
            cart: engine.snapshot().await,
        }),
    ))
}

/// Set a line's quantity
#[instrument(skip(state, headers, request))]
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartSnapshot>, ApiError> {
    let engine = session_engine(&state, &headers).await?;
    engine
        .update_quantity(&item_id, request.quantity)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(engine.snapshot().await))
}

/// Remove a line (no-op when absent)
#[instrument(skip(state, headers))]
pub async fn remove_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Result<Json<CartSnapshot>, ApiError> {
    let engine = session_engine(&state, &headers).await?;
    engine
        .remove_item(&item_id)
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(engine.snapshot().await))
}

/// Empty the cart
pub async fn clear_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CartSnapshot>, ApiError> {
    let engine = session_engine(&state, &headers).await?;
    engine.clear().await.map_err(cart_error_to_response)?;
    Ok(Json(engine.snapshot().await))
}

/// Book a consultation; each booking is its own line
#[instrument(skip(state, headers, request), fields(product_id = %request.product_id))]
pub async fn book_consultation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BookConsultationRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let entry = state
        .catalog
        .get(&request.product_id)
        .await
        .map_err(cart_error_to_response)?
        .filter(|entry| entry.active)
        .ok_or_else(|| {
            cart_error_to_response(CartError::ItemNotFound {
                id: request.product_id.clone(),
            })
        })?;

    if entry.kind != ItemKind::Consultation {
        return Err(cart_error_to_response(CartError::Validation(format!(
            "{} is not a consultation",
            entry.id
        ))));
    }

    let mut booking = CartItem::consultation(entry.name.clone(), entry.price);
    if let Some(url) = &entry.image {
        booking = booking.with_image(url.clone());
    }

    let engine = session_engine(&state, &headers).await?;
    let item = engine
        .add_item(booking)
        .await
        .map_err(cart_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(ItemResponse {
            item,
            cart: engine.snapshot().await,
        }),
    ))
}

// =============================================================================
// Catalog
// =============================================================================

/// Get products list
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .catalog
        .list_active()
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(serde_json::json!({
        "count": products.len(),
        "products": products,
    })))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .catalog
        .get(&product_id)
        .await
        .map_err(cart_error_to_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    format!("Product not found: {}", product_id),
                    404,
                )),
            )
        })?;

    Ok(Json(product))
}

// =============================================================================
// Checkout
// =============================================================================

/// Open the payment gateway for the whole cart
#[instrument(skip(state, headers))]
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let engine = session_engine(&state, &headers).await?;
    let ticket = engine
        .initiate_checkout()
        .await
        .map_err(cart_error_to_response)?;

    let status = engine.checkout_status();
    let amount = status
        .amount
        .ok_or_else(|| cart_error_to_response(CartError::Internal("checkout has no amount".to_string())))?;

    info!("Opened checkout {} for {}", ticket.reference(), amount);

    Ok(Json(CheckoutResponse {
        reference: ticket.reference().to_string(),
        amount,
        amount_display: amount.display(),
        payment: ticket.client_payload().clone(),
    }))
}

/// Current checkout status
pub async fn get_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CheckoutStatus>, ApiError> {
    let engine = session_engine(&state, &headers).await?;
    Ok(Json(engine.checkout_status()))
}

/// Acknowledge a finished attempt
pub async fn reset_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CheckoutStatus>, ApiError> {
    let engine = session_engine(&state, &headers).await?;
    engine
        .reset_checkout()
        .await
        .map_err(cart_error_to_response)?;
    Ok(Json(engine.checkout_status()))
}

// =============================================================================
// Gateway callbacks
// =============================================================================

async fn dispatch(state: &AppState, reference: String, event: GatewayEvent) -> Json<SignalResponse> {
    let tx_ref = TransactionRef::from(reference);
    let disposition = state.gateway.dispatch(&tx_ref, event).await;
    Json(SignalResponse {
        reference: tx_ref.to_string(),
        disposition,
    })
}

/// Widget reports its modal is showing
pub async fn gateway_ready(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Json<SignalResponse> {
    dispatch(&state, reference, GatewayEvent::Confirmed).await
}

/// Widget `callback` payload
#[instrument(skip(state, callback), fields(status = %callback.status))]
pub async fn gateway_success(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(callback): Json<FlutterwaveCallback>,
) -> Result<Json<SignalResponse>, ApiError> {
    if let Some(tx_ref) = &callback.tx_ref {
        if tx_ref != &reference {
            return Err(cart_error_to_response(CartError::Validation(format!(
                "callback tx_ref {} does not match {}",
                tx_ref, reference
            ))));
        }
    }
    Ok(dispatch(&state, reference, callback.into_event()).await)
}

/// Widget reported an error (body optional)
pub async fn gateway_failure(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    body: Bytes,
) -> Json<SignalResponse> {
    let reason = serde_json::from_slice::<FailureRequest>(&body)
        .ok()
        .and_then(|request| request.reason)
        .unwrap_or_else(|| "payment failed".to_string());
    dispatch(&state, reference, GatewayEvent::Failed { reason }).await
}

/// Widget `onclose`
pub async fn gateway_cancel(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Json<SignalResponse> {
    dispatch(&state, reference, GatewayEvent::Cancelled).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
    }

    #[test]
    fn test_cart_error_conversion() {
        let (status, Json(body)) = cart_error_to_response(CartError::AuthRequired);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.details.as_deref(), Some("Please log in to complete checkout."));

        let (status, _) = cart_error_to_response(CartError::CheckoutInProgress {
            reference: "tx-1".to_string(),
        });
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_identity_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(identity_from_headers(&headers).is_err());

        headers.insert(SESSION_HEADER, HeaderValue::from_static("sess-1"));
        let (session, identity) = identity_from_headers(&headers).unwrap();
        assert_eq!(session, "sess-1");
        assert!(!identity.authenticated);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("user-42"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("ada@example.com"));
        let (_, identity) = identity_from_headers(&headers).unwrap();
        assert!(identity.authenticated);
        assert_eq!(identity.subject, "user-42");
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert_eq!(identity.display_name, None);
    }
}
