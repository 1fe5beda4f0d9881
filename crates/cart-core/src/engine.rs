//! # Cart Engine
//!
//! Owns one shopper's cart and drives checkout attempts against a
//! [`PaymentGateway`](crate::gateway::PaymentGateway).
//!
//! - Every mutation is persisted before it becomes visible in memory.
//! - At most one attempt is active; its [`TransactionRef`] is the only key
//!   that can resolve it.
//! - A ready timer fails the attempt with `TimedOut` if the gateway never
//!   confirms its UI. Once confirmed, a longer payment timer bounds how long
//!   the attempt (and the cart lock) can stay open.
//! - On success the bookable lines are written to the
//!   [`OrderLedger`](crate::ledger::OrderLedger) and the cart is cleared.
//!   Any other outcome leaves the cart untouched.

use crate::cart::{Cart, Totals};
use crate::catalog::BoxedCatalogStore;
use crate::checkout::{
    CheckoutAttempt, CheckoutOutcome, CheckoutPhase, CheckoutStatus, Customer, PaymentReceipt,
    SignalDisposition, TransactionRef,
};
use crate::config::CheckoutConfig;
use crate::error::{CartError, CartResult};
use crate::gateway::{
    BoxedPaymentGateway, GatewayCallbacks, GatewayEvent, GatewayHandle, GatewaySignalSink,
    PaymentRequest,
};
use crate::identity::{BoxedIdentityProvider, CartScope, Identity};
use crate::item::CartItem;
use crate::ledger::{BoxedOrderLedger, LedgerRecord};
use crate::money::Price;
use crate::store::{BoxedCartStore, MemoryCartStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

/// Read-only view of the cart and checkout state
#[derive(Debug, Clone, Serialize)]
pub struct CartSnapshot {
    pub scope: CartScope,
    pub items: Vec<CartItem>,
    pub totals: Totals,
    pub checkout: CheckoutStatus,
}

/// Returned by [`CartEngine::initiate_checkout`] once the gateway is open
#[derive(Debug)]
pub struct CheckoutTicket {
    reference: TransactionRef,
    client_payload: serde_json::Value,
    outcome: oneshot::Receiver<CheckoutOutcome>,
}

impl CheckoutTicket {
    pub fn reference(&self) -> &TransactionRef {
        &self.reference
    }

    /// Gateway data the client renders (widget config and so on)
    pub fn client_payload(&self) -> &serde_json::Value {
        &self.client_payload
    }

    /// Wait for the attempt to reach a terminal phase
    pub async fn outcome(self) -> CartResult<CheckoutOutcome> {
        self.outcome
            .await
            .map_err(|_| CartError::Internal("checkout attempt was dropped".to_string()))
    }
}

/// Builder for [`CartEngine`]
pub struct CartEngineBuilder {
    config: CheckoutConfig,
    gateway: BoxedPaymentGateway,
    ledger: BoxedOrderLedger,
    identity: BoxedIdentityProvider,
    store: Option<BoxedCartStore>,
    catalog: Option<BoxedCatalogStore>,
}

impl CartEngineBuilder {
    /// Builder: set engine config
    pub fn config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder: set cart persistence (in-memory by default)
    pub fn store(mut self, store: BoxedCartStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Builder: enable `add_from_catalog`
    pub fn catalog(mut self, catalog: BoxedCatalogStore) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Bind to the current identity and load its persisted cart
    pub async fn build(self) -> CartResult<CartEngine> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCartStore::new()));

        let identity = self.identity.current_identity().await;
        let scope = identity.scope();
        let cart = load_cart(&store, &self.config, &scope).await?;
        let (status_tx, _) = watch::channel(CheckoutStatus::idle());

        info!(
            scope = %scope,
            items = cart.len(),
            gateway = self.gateway.provider_name(),
            "Cart engine ready"
        );

        Ok(CartEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                store,
                ledger: self.ledger,
                gateway: self.gateway,
                identity: self.identity,
                catalog: self.catalog,
                state: Mutex::new(EngineState {
                    scope,
                    cart,
                    checkout: Checkout::Idle,
                }),
                status_tx,
            }),
        })
    }
}

/// Cart and checkout coordinator for one shopper.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: CheckoutConfig,
    store: BoxedCartStore,
    ledger: BoxedOrderLedger,
    gateway: BoxedPaymentGateway,
    identity: BoxedIdentityProvider,
    catalog: Option<BoxedCatalogStore>,
    state: Mutex<EngineState>,
    status_tx: watch::Sender<CheckoutStatus>,
}

struct EngineState {
    scope: CartScope,
    cart: Cart,
    checkout: Checkout,
}

enum Checkout {
    Idle,
    Active(ActiveAttempt),
    Finished {
        attempt: CheckoutAttempt,
        outcome: CheckoutOutcome,
    },
}

/// Which timer bounds the active attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    /// Gateway UI not confirmed yet
    Ready,
    /// UI confirmed, waiting for a result
    Payment,
}

struct ActiveAttempt {
    phase: CheckoutPhase,
    attempt: CheckoutAttempt,
    confirmed: bool,
    handle: Option<Box<dyn GatewayHandle>>,
    timer: Option<AbortHandle>,
    notify: Option<oneshot::Sender<CheckoutOutcome>>,
}

impl ActiveAttempt {
    fn status(&self) -> CheckoutStatus {
        CheckoutStatus::active(self.phase, &self.attempt, self.confirmed)
    }
}

impl EngineState {
    fn ensure_unlocked(&self) -> CartResult<()> {
        match &self.checkout {
            Checkout::Active(active) => Err(CartError::CheckoutInProgress {
                reference: active.attempt.reference.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn checkout_status(&self) -> CheckoutStatus {
        match &self.checkout {
            Checkout::Idle => CheckoutStatus::idle(),
            Checkout::Active(active) => active.status(),
            Checkout::Finished { attempt, outcome } => CheckoutStatus::finished(attempt, outcome),
        }
    }
}

/// Load persisted lines, dropping any that no longer pass validation
async fn load_cart(
    store: &BoxedCartStore,
    config: &CheckoutConfig,
    scope: &CartScope,
) -> CartResult<Cart> {
    let items = store.load(scope).await?;
    let mut cart = Cart::new(config.currency);
    for item in items {
        let id = item.id.clone();
        if let Err(e) = cart.add(item) {
            warn!(scope = %scope, item_id = %id, "Dropping persisted cart line: {}", e);
        }
    }
    Ok(cart)
}

impl CartEngine {
    /// Start building an engine
    pub fn builder(
        gateway: BoxedPaymentGateway,
        ledger: BoxedOrderLedger,
        identity: BoxedIdentityProvider,
    ) -> CartEngineBuilder {
        CartEngineBuilder {
            config: CheckoutConfig::default(),
            gateway,
            ledger,
            identity,
            store: None,
            catalog: None,
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add a line (merging same-id lines). Returns the resulting line.
    #[instrument(skip(self, candidate), fields(item_id = %candidate.id, kind = %candidate.kind))]
    pub async fn add_item(&self, candidate: CartItem) -> CartResult<CartItem> {
        let mut state = self.inner.state.lock().await;
        state.ensure_unlocked()?;

        let mut next = state.cart.clone();
        let id = next.add(candidate).map_err(|e| {
            debug!("Rejected cart line: {}", e);
            e
        })?;
        self.inner.store.save(&state.scope, next.items()).await?;
        state.cart = next;

        state
            .cart
            .get(&id)
            .cloned()
            .ok_or_else(|| CartError::Internal(format!("line {} vanished after add", id)))
    }

    /// Snapshot a catalog item into the cart at its current price
    pub async fn add_from_catalog(&self, item_id: &str, quantity: u32) -> CartResult<CartItem> {
        let catalog = self
            .inner
            .catalog
            .as_ref()
            .ok_or_else(|| CartError::Configuration("no catalog configured".to_string()))?;

        let entry = catalog
            .get(item_id)
            .await?
            .filter(|entry| entry.active)
            .ok_or_else(|| CartError::ItemNotFound {
                id: item_id.to_string(),
            })?;

        self.add_item(entry.to_cart_item(quantity)).await
    }

    /// Add a consultation booking; it always becomes its own line
    pub async fn book_consultation(
        &self,
        name: impl Into<String>,
        price: Price,
    ) -> CartResult<CartItem> {
        self.add_item(CartItem::consultation(name, price)).await
    }

    /// Remove a line. Unknown ids are a no-op.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, id: &str) -> CartResult<bool> {
        self.mutate(|cart| Ok(cart.remove(id))).await
    }

    /// Set a line's quantity; zero or less removes it
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, id: &str, quantity: i64) -> CartResult<bool> {
        self.mutate(|cart| cart.update_quantity(id, quantity)).await
    }

    /// Empty the cart
    #[instrument(skip(self))]
    pub async fn clear(&self) -> CartResult<()> {
        self.mutate(|cart| {
            let changed = !cart.is_empty();
            cart.clear();
            Ok(changed)
        })
        .await
        .map(|_| ())
    }

    /// Apply `f` to a copy, persist if it changed, then commit
    async fn mutate<F>(&self, f: F) -> CartResult<bool>
    where
        F: FnOnce(&mut Cart) -> CartResult<bool>,
    {
        let mut state = self.inner.state.lock().await;
        state.ensure_unlocked()?;

        let mut next = state.cart.clone();
        if !f(&mut next)? {
            return Ok(false);
        }
        self.inner.store.save(&state.scope, next.items()).await?;
        state.cart = next;
        Ok(true)
    }

    pub async fn items(&self) -> Vec<CartItem> {
        self.inner.state.lock().await.cart.items().to_vec()
    }

    pub async fn totals(&self) -> Totals {
        self.inner.state.lock().await.cart.totals()
    }

    pub async fn snapshot(&self) -> CartSnapshot {
        let state = self.inner.state.lock().await;
        CartSnapshot {
            scope: state.scope.clone(),
            items: state.cart.items().to_vec(),
            totals: state.cart.totals(),
            checkout: state.checkout_status(),
        }
    }

    pub async fn scope(&self) -> CartScope {
        self.inner.state.lock().await.scope.clone()
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Re-read the identity and switch carts if it changed.
    ///
    /// Returns `true` when the engine moved to a different scope. Refused
    /// while a checkout attempt is active.
    #[instrument(skip(self))]
    pub async fn sync_identity(&self) -> CartResult<bool> {
        let identity = self.inner.identity.current_identity().await;
        let mut state = self.inner.state.lock().await;
        if identity.scope() == state.scope {
            return Ok(false);
        }
        state.ensure_unlocked()?;
        self.inner.rebind(&mut state, identity.scope()).await?;
        Ok(true)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Open the gateway for the whole cart.
    ///
    /// Fails fast with `CheckoutInProgress`, `AuthRequired` or `EmptyCart`
    /// (checked in that order) without touching the cart. A gateway that
    /// cannot be opened moves the attempt to `Failed` and returns
    /// `GatewayInit`.
    #[instrument(skip(self))]
    pub async fn initiate_checkout(&self) -> CartResult<CheckoutTicket> {
        let identity = self.inner.identity.current_identity().await;

        let (attempt, outcome_rx) = {
            let mut state = self.inner.state.lock().await;
            state.ensure_unlocked()?;

            if !identity.authenticated {
                return Err(CartError::AuthRequired);
            }
            if identity.scope() != state.scope {
                self.inner.rebind(&mut state, identity.scope()).await?;
            }
            if state.cart.is_empty() {
                return Err(CartError::EmptyCart);
            }

            let attempt = new_attempt(&identity, &state.cart);
            let (outcome_tx, outcome_rx) = oneshot::channel();
            let active = ActiveAttempt {
                phase: CheckoutPhase::Initiating,
                attempt: attempt.clone(),
                confirmed: false,
                handle: None,
                timer: None,
                notify: Some(outcome_tx),
            };
            self.inner.publish(active.status());
            state.checkout = Checkout::Active(active);
            (attempt, outcome_rx)
        };

        info!(
            reference = %attempt.reference,
            amount = %attempt.amount,
            items = attempt.items.len(),
            "Opening payment gateway"
        );

        let request = PaymentRequest {
            reference: attempt.reference.clone(),
            amount: attempt.amount,
            customer: attempt.customer.clone(),
            title: self.inner.config.title.clone(),
            description: self.inner.config.description.clone(),
        };
        let sink: Arc<dyn GatewaySignalSink> = Arc::new(EngineSink {
            inner: Arc::downgrade(&self.inner),
        });
        let callbacks = GatewayCallbacks::new(attempt.reference.clone(), sink);

        let handle = match self.inner.gateway.open(&request, callbacks).await {
            Ok(handle) => handle,
            Err(e) => {
                let error = match e {
                    CartError::GatewayInit(_) => e,
                    other => CartError::GatewayInit(other.to_string()),
                };
                warn!(reference = %attempt.reference, "Gateway failed to open: {}", error);
                self.inner
                    .fail_opening(&attempt.reference, error.clone())
                    .await;
                return Err(error);
            }
        };

        let client_payload = handle.client_payload();
        self.inner.await_gateway(&attempt.reference, handle).await;

        Ok(CheckoutTicket {
            reference: attempt.reference,
            client_payload,
            outcome: outcome_rx,
        })
    }

    /// Deliver a gateway signal for `reference`
    pub async fn resolve(&self, reference: &TransactionRef, event: GatewayEvent) -> SignalDisposition {
        self.inner.deliver_event(reference, event).await
    }

    /// Current checkout status
    pub fn checkout_status(&self) -> CheckoutStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// Watch checkout status changes
    pub fn subscribe(&self) -> watch::Receiver<CheckoutStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Acknowledge a finished attempt and return to `Idle`
    pub async fn reset_checkout(&self) -> CartResult<()> {
        let mut state = self.inner.state.lock().await;
        state.ensure_unlocked()?;
        if state.checkout_status().phase.is_terminal() {
            state.checkout = Checkout::Idle;
            self.inner.publish(CheckoutStatus::idle());
        }
        Ok(())
    }
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine")
            .field("gateway", &self.inner.gateway.provider_name())
            .field("checkout", &self.checkout_status().phase)
            .finish()
    }
}

fn new_attempt(identity: &Identity, cart: &Cart) -> CheckoutAttempt {
    let email = identity.email.clone().unwrap_or_default();
    let name = identity
        .display_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| email.clone());

    CheckoutAttempt {
        reference: TransactionRef::mint(),
        amount: cart.totals().total_price,
        customer: Customer { email, name },
        user_id: identity.subject.clone(),
        items: cart.items().to_vec(),
        started_at: Utc::now(),
    }
}

impl EngineInner {
    fn publish(&self, status: CheckoutStatus) {
        self.status_tx.send_replace(status);
    }

    async fn rebind(&self, state: &mut EngineState, scope: CartScope) -> CartResult<()> {
        let cart = load_cart(&self.store, &self.config, &scope).await?;
        info!(from = %state.scope, to = %scope, items = cart.len(), "Identity changed, switching cart");

        state.scope = scope;
        state.cart = cart;
        if matches!(state.checkout, Checkout::Finished { .. }) {
            state.checkout = Checkout::Idle;
            self.publish(CheckoutStatus::idle());
        }
        Ok(())
    }

    /// Gateway open returned an error
    async fn fail_opening(&self, reference: &TransactionRef, error: CartError) {
        let mut state = self.state.lock().await;
        let Some(active) = take_active(&mut state, reference) else {
            return;
        };
        let outcome = CheckoutOutcome::Failed {
            reference: reference.clone(),
            error,
        };
        self.finish(&mut state, active, outcome);
    }

    /// Gateway opened: store the handle and arm the ready timer
    async fn await_gateway(self: &Arc<Self>, reference: &TransactionRef, handle: Box<dyn GatewayHandle>) {
        let mut state = self.state.lock().await;
        match &mut state.checkout {
            Checkout::Active(active) if &active.attempt.reference == reference => {
                active.phase = CheckoutPhase::AwaitingGateway;
                let deadline = if active.confirmed {
                    Deadline::Payment
                } else {
                    Deadline::Ready
                };
                active.timer = Some(self.arm_timer(reference.clone(), deadline));
                active.handle = Some(handle);
                let status = active.status();
                self.publish(status);
            }
            _ => {
                // Resolved by a callback while the gateway was still opening
                debug!(reference = %reference, "Attempt settled during gateway open");
                if handle.supports_close() {
                    handle.close();
                }
            }
        }
    }

    fn arm_timer(self: &Arc<Self>, reference: TransactionRef, deadline: Deadline) -> AbortHandle {
        let weak = Arc::downgrade(self);
        let timeout = match deadline {
            Deadline::Ready => self.config.ready_timeout,
            Deadline::Payment => self.config.payment_timeout,
        };
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&reference, deadline).await;
            }
        })
        .abort_handle()
    }

    /// A timer fired
    async fn expire(&self, reference: &TransactionRef, deadline: Deadline) {
        let mut state = self.state.lock().await;
        let still_waiting = matches!(
            &state.checkout,
            Checkout::Active(active)
                if &active.attempt.reference == reference
                    && active.confirmed == (deadline == Deadline::Payment)
        );
        if !still_waiting {
            return;
        }
        let Some(mut active) = take_active(&mut state, reference) else {
            return;
        };

        // Running inside the timer task; drop the handle instead of aborting ourselves
        active.timer = None;

        match deadline {
            Deadline::Ready => warn!(
                reference = %reference,
                timeout_ms = self.config.ready_timeout.as_millis() as u64,
                "Gateway never confirmed; payment state uncertain"
            ),
            Deadline::Payment => warn!(
                reference = %reference,
                timeout_ms = self.config.payment_timeout.as_millis() as u64,
                "Gateway confirmed but never reported a result; payment state uncertain"
            ),
        }
        let outcome = CheckoutOutcome::TimedOut {
            reference: reference.clone(),
        };
        self.finish(&mut state, active, outcome);
    }

    #[instrument(skip(self, reference, event), fields(reference = %reference))]
    async fn deliver_event(self: &Arc<Self>, reference: &TransactionRef, event: GatewayEvent) -> SignalDisposition {
        let mut state = self.state.lock().await;

        let matches_active = matches!(
            &state.checkout,
            Checkout::Active(active) if &active.attempt.reference == reference
        );
        if !matches_active {
            warn!("Ignoring gateway signal for inactive transaction: {:?}", event);
            return SignalDisposition::Ignored;
        }

        if event == GatewayEvent::Confirmed {
            let Checkout::Active(active) = &mut state.checkout else {
                return SignalDisposition::Ignored;
            };
            if active.confirmed {
                return SignalDisposition::Ignored;
            }
            active.confirmed = true;
            if let Some(timer) = active.timer.take() {
                timer.abort();
                active.timer = Some(self.arm_timer(reference.clone(), Deadline::Payment));
            }
            debug!("Gateway UI confirmed");
            let status = active.status();
            let phase = active.phase;
            self.publish(status);
            return SignalDisposition::Applied(phase);
        }

        let Some(mut active) = take_active(&mut state, reference) else {
            return SignalDisposition::Ignored;
        };
        if let Some(timer) = active.timer.take() {
            timer.abort();
        }

        let outcome = match event {
            GatewayEvent::Succeeded(receipt) => self.settle(&mut state, &active.attempt, receipt).await,
            GatewayEvent::Failed { reason } => CheckoutOutcome::Failed {
                reference: reference.clone(),
                error: CartError::PaymentDeclined { reason },
            },
            GatewayEvent::Cancelled => CheckoutOutcome::Cancelled {
                reference: reference.clone(),
            },
            GatewayEvent::Confirmed => {
                return SignalDisposition::Ignored;
            }
        };

        let phase = outcome.phase();
        self.finish(&mut state, active, outcome);
        SignalDisposition::Applied(phase)
    }

    /// Record bookings and clear the cart after a successful payment
    async fn settle(
        &self,
        state: &mut EngineState,
        attempt: &CheckoutAttempt,
        receipt: PaymentReceipt,
    ) -> CheckoutOutcome {
        let reference = attempt.reference.to_string();
        let email = Some(attempt.customer.email.clone()).filter(|email| !email.is_empty());
        let mut warnings = Vec::new();

        for item in attempt.items.iter().filter(|item| item.kind.is_bookable()) {
            let record = LedgerRecord::for_item(item, attempt.user_id.clone(), email.clone(), reference.clone());
            if let Err(e) = self.ledger.append(&record).await {
                warn!(item_id = %item.id, "Ledger append failed after payment: {}", e);
                warnings.push(CartError::LedgerWrite {
                    reference: reference.clone(),
                    message: e.to_string(),
                });
            }
        }

        state.cart.clear();
        if let Err(e) = self.store.save(&state.scope, &[]).await {
            warn!(scope = %state.scope, "Failed to persist cleared cart: {}", e);
        }

        info!(
            reference = %attempt.reference,
            amount = %attempt.amount,
            warnings = warnings.len(),
            "Payment succeeded"
        );

        CheckoutOutcome::Succeeded {
            reference: attempt.reference.clone(),
            receipt,
            warnings,
        }
    }

    /// Close the gateway registration and record the outcome
    fn finish(&self, state: &mut EngineState, mut active: ActiveAttempt, outcome: CheckoutOutcome) {
        if let Some(handle) = active.handle.take() {
            if handle.supports_close() {
                handle.close();
            }
        }
        match outcome.error() {
            Some(e) if !e.is_soft() => warn!(reference = %active.attempt.reference, "Checkout ended: {}", e),
            _ => info!(reference = %active.attempt.reference, phase = ?outcome.phase(), "Checkout ended"),
        }

        self.publish(CheckoutStatus::finished(&active.attempt, &outcome));
        if let Some(notify) = active.notify.take() {
            let _ = notify.send(outcome.clone());
        }
        state.checkout = Checkout::Finished {
            attempt: active.attempt,
            outcome,
        };
    }
}

fn take_active(state: &mut EngineState, reference: &TransactionRef) -> Option<ActiveAttempt> {
    match std::mem::replace(&mut state.checkout, Checkout::Idle) {
        Checkout::Active(active) if &active.attempt.reference == reference => Some(active),
        other => {
            state.checkout = other;
            None
        }
    }
}

/// Routes gateway callbacks back into the engine
struct EngineSink {
    inner: Weak<EngineInner>,
}

#[async_trait]
impl GatewaySignalSink for EngineSink {
    async fn deliver(&self, reference: &TransactionRef, event: GatewayEvent) -> SignalDisposition {
        match self.inner.upgrade() {
            Some(inner) => inner.deliver_event(reference, event).await,
            None => SignalDisposition::Ignored,
        }
    }
}
