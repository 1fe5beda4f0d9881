//! # Identity
//!
//! Who the cart belongs to. Authentication itself happens elsewhere; the
//! engine only consumes the resulting handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Authenticated user or anonymous session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub authenticated: bool,

    /// Stable user id (authenticated) or session id (anonymous)
    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn anonymous(session_id: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            subject: session_id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn user(
        user_id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            authenticated: true,
            subject: user_id.into(),
            email: Some(email.into()),
            display_name: Some(display_name.into()),
        }
    }

    /// Cart namespace for this identity
    pub fn scope(&self) -> CartScope {
        if self.authenticated {
            CartScope::User(self.subject.clone())
        } else {
            CartScope::Anonymous(self.subject.clone())
        }
    }
}

/// Persistence namespace of a cart.
///
/// Anonymous and user carts never share a key, so switching identity on a
/// shared device cannot surface someone else's lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartScope {
    Anonymous(String),
    User(String),
}

impl CartScope {
    pub fn key(&self) -> String {
        match self {
            CartScope::Anonymous(session) => format!("anon-{}", session),
            CartScope::User(user) => format!("user-{}", user),
        }
    }
}

impl std::fmt::Display for CartScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Source of the current identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Identity;
}

/// Type alias for a shared identity provider
pub type BoxedIdentityProvider = Arc<dyn IdentityProvider>;

/// Identity held in memory and swapped by whoever observes logins/logouts
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    current: Arc<RwLock<Identity>>,
}

impl SessionIdentity {
    pub fn new(identity: Identity) -> Self {
        Self {
            current: Arc::new(RwLock::new(identity)),
        }
    }

    pub fn set(&self, identity: Identity) {
        match self.current.write() {
            Ok(mut guard) => *guard = identity,
            Err(poisoned) => *poisoned.into_inner() = identity,
        }
    }

    pub fn get(&self) -> Identity {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentity {
    async fn current_identity(&self) -> Identity {
        self.get()
    }
}
