//! # Application State
//!
//! Shared state for the Axum application.
//! Holds one cart engine per browser session plus the adapters they share.

use cart_backend::{FlutterwaveInlineGateway, LedgerConfig, RestLedger};
use cart_core::{
    BoxedCartStore, BoxedOrderLedger, CartEngine, CartError, CartResult, CheckoutConfig,
    Currency, FileCartStore, Identity, MemoryCartStore, MemoryLedger, SessionIdentity,
    StaticCatalog,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default idle time after which a session's engine is dropped
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Currency every cart is priced in
    pub currency: Currency,
    /// Gateway ready timeout
    pub ready_timeout: Duration,
    /// Upper bound for a confirmed checkout
    pub payment_timeout: Duration,
    /// Idle sessions older than this are evicted by the sweeper
    pub session_idle: Duration,
    /// Directory for file-backed carts (in-memory when unset)
    pub store_dir: Option<PathBuf>,
    /// Catalog TOML file
    pub catalog_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let currency = match std::env::var("CART_CURRENCY") {
            Ok(code) => code
                .parse()
                .map_err(|e| anyhow::anyhow!("CART_CURRENCY: {}", e))?,
            Err(_) => Currency::USD,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            currency,
            ready_timeout: std::env::var("CART_READY_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(cart_core::DEFAULT_READY_TIMEOUT),
            payment_timeout: std::env::var("CART_PAYMENT_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(cart_core::DEFAULT_PAYMENT_TIMEOUT),
            session_idle: std::env::var("CART_SESSION_IDLE_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SESSION_IDLE),
            store_dir: std::env::var("CART_STORE_DIR").ok().map(PathBuf::from),
            catalog_path: std::env::var("CATALOG_PATH").ok().map(PathBuf::from),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Engine settings derived from this config
    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig::new(self.currency)
            .with_ready_timeout(self.ready_timeout)
            .with_payment_timeout(self.payment_timeout)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "development".to_string(),
            currency: Currency::USD,
            ready_timeout: cart_core::DEFAULT_READY_TIMEOUT,
            payment_timeout: cart_core::DEFAULT_PAYMENT_TIMEOUT,
            session_idle: DEFAULT_SESSION_IDLE,
            store_dir: None,
            catalog_path: None,
        }
    }
}

/// Engine bound to one browser session
#[derive(Clone)]
struct SessionCart {
    engine: CartEngine,
    identity: Arc<SessionIdentity>,
    last_seen: Arc<std::sync::Mutex<Instant>>,
}

impl SessionCart {
    fn touch(&self) {
        match self.last_seen.lock() {
            Ok(mut seen) => *seen = Instant::now(),
            Err(poisoned) => *poisoned.into_inner() = Instant::now(),
        }
    }

    fn idle_for(&self) -> Duration {
        match self.last_seen.lock() {
            Ok(seen) => seen.elapsed(),
            Err(poisoned) => poisoned.into_inner().elapsed(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: Arc<AppConfig>,
    /// Product catalog
    pub catalog: Arc<StaticCatalog>,
    /// Cart persistence shared by every session
    pub store: BoxedCartStore,
    /// Purchase ledger
    pub ledger: BoxedOrderLedger,
    /// Flutterwave widget adapter
    pub gateway: Arc<FlutterwaveInlineGateway>,
    sessions: Arc<RwLock<HashMap<String, SessionCart>>>,
}

impl AppState {
    /// Create state from environment variables
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let catalog = load_catalog(config.catalog_path.as_ref())?;

        let gateway = FlutterwaveInlineGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Flutterwave: {}", e))?;

        let ledger: BoxedOrderLedger = match LedgerConfig::from_env() {
            Ok(ledger_config) => {
                info!("Ledger table: {}", ledger_config.table);
                Arc::new(RestLedger::new(ledger_config)?)
            }
            Err(e) => {
                warn!("{}; bookings are kept in memory only", e);
                Arc::new(MemoryLedger::new())
            }
        };

        let store: BoxedCartStore = match &config.store_dir {
            Some(dir) => Arc::new(FileCartStore::new(dir.clone())),
            None => Arc::new(MemoryCartStore::new()),
        };

        Ok(Self::with_components(config, catalog, store, ledger, gateway))
    }

    /// Assemble state from explicit parts (for testing)
    pub fn with_components(
        config: AppConfig,
        catalog: StaticCatalog,
        store: BoxedCartStore,
        ledger: BoxedOrderLedger,
        gateway: FlutterwaveInlineGateway,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            store,
            ledger,
            gateway: Arc::new(gateway),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Engine for `session_id`, re-bound to `identity`.
    ///
    /// A different identity is refused with `CheckoutInProgress` while the
    /// session has an open attempt; the session stays bound to the shopper
    /// who started it.
    pub async fn engine_for(&self, session_id: &str, identity: Identity) -> CartResult<CartEngine> {
        let existing = self.sessions.read().await.get(session_id).cloned();
        if let Some(session) = existing {
            session.touch();
            let previous = session.identity.get();
            session.identity.set(identity);
            match session.engine.sync_identity().await {
                Ok(_) => {}
                Err(CartError::CheckoutInProgress { reference }) => {
                    session.identity.set(previous);
                    debug!(session_id, reference = %reference, "Identity change refused during checkout");
                    // The attempt belongs to someone else; don't hand out its reference
                    return Err(CartError::CheckoutInProgress {
                        reference: "held by another sign-in".to_string(),
                    });
                }
                Err(e) => {
                    session.identity.set(previous);
                    return Err(e);
                }
            }
            return Ok(session.engine);
        }

        let provider = Arc::new(SessionIdentity::new(identity));
        let engine = CartEngine::builder(self.gateway.clone(), self.ledger.clone(), provider.clone())
            .config(self.config.checkout_config())
            .store(self.store.clone())
            .catalog(self.catalog.clone())
            .build()
            .await?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert(SessionCart {
                engine,
                identity: provider,
                last_seen: Arc::new(std::sync::Mutex::new(Instant::now())),
            });
        Ok(session.engine.clone())
    }

    /// Number of sessions with a live engine
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop engines idle for longer than `session_idle`.
    ///
    /// Sessions with an open checkout are kept. Cart lines live in the
    /// store, so an evicted session reloads them on its next request.
    pub async fn sweep_idle_sessions(&self) -> usize {
        let idle = self.config.session_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            session.idle_for() < idle || session.engine.checkout_status().phase.is_active()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Run [`AppState::sweep_idle_sessions`] periodically
    pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        let state = self.clone();
        let period = (self.config.session_idle / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                state.sweep_idle_sessions().await;
            }
        })
    }
}

/// Load the catalog from `path`, or the default locations
fn load_catalog(path: Option<&PathBuf>) -> anyhow::Result<StaticCatalog> {
    let candidates: Vec<PathBuf> = match path {
        Some(path) => vec![path.clone()],
        None => vec![
            PathBuf::from("config/catalog.toml"),
            PathBuf::from("../config/catalog.toml"),
            PathBuf::from("../../config/catalog.toml"),
        ],
    };

    for path in candidates {
        if let Ok(content) = std::fs::read_to_string(&path) {
            let catalog = StaticCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            info!("Loaded {} catalog items from {}", catalog.items.len(), path.display());
            return Ok(catalog);
        }
    }

    warn!("No catalog found, using empty catalog");
    Ok(StaticCatalog::new())
}
