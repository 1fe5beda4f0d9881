//! # Cart Persistence
//!
//! Keyed-by-scope storage of cart lines. Reader and writer are always this
//! crate, so the JSON layout is not a compatibility surface.

use crate::error::{CartError, CartResult};
use crate::identity::CartScope;
use crate::item::CartItem;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage backend for cart lines
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Load the lines saved for `scope` (empty if none)
    async fn load(&self, scope: &CartScope) -> CartResult<Vec<CartItem>>;

    /// Replace the lines saved for `scope`
    async fn save(&self, scope: &CartScope, items: &[CartItem]) -> CartResult<()>;
}

/// Type alias for a shared cart store
pub type BoxedCartStore = Arc<dyn CartStore>;

/// In-process store; survives navigation, not restarts
#[derive(Debug, Default, Clone)]
pub struct MemoryCartStore {
    carts: Arc<RwLock<HashMap<CartScope, Vec<CartItem>>>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn load(&self, scope: &CartScope) -> CartResult<Vec<CartItem>> {
        Ok(self.carts.read().await.get(scope).cloned().unwrap_or_default())
    }

    async fn save(&self, scope: &CartScope, items: &[CartItem]) -> CartResult<()> {
        let mut carts = self.carts.write().await;
        if items.is_empty() {
            carts.remove(scope);
        } else {
            carts.insert(scope.clone(), items.to_vec());
        }
        Ok(())
    }
}

/// One JSON file per scope under a directory
#[derive(Debug, Clone)]
pub struct FileCartStore {
    dir: PathBuf,
}

impl FileCartStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `anon-<hex>.json` / `user-<hex>.json`; hex keeps distinct ids distinct
    fn path_for(&self, scope: &CartScope) -> PathBuf {
        let (prefix, id) = match scope {
            CartScope::Anonymous(session) => ("anon", session),
            CartScope::User(user) => ("user", user),
        };
        self.dir.join(format!("{}-{}.json", prefix, hex::encode(id.as_bytes())))
    }
}

#[async_trait]
impl CartStore for FileCartStore {
    async fn load(&self, scope: &CartScope) -> CartResult<Vec<CartItem>> {
        let path = self.path_for(scope);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(CartError::Storage(format!("{}: {}", path.display(), e))),
        }
    }

    async fn save(&self, scope: &CartScope, items: &[CartItem]) -> CartResult<()> {
        let path = self.path_for(scope);

        if items.is_empty() {
            return match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(CartError::Storage(format!("{}: {}", path.display(), e))),
            };
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CartError::Storage(format!("{}: {}", self.dir.display(), e)))?;

        let bytes = serde_json::to_vec_pretty(items)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| CartError::Storage(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CartError::Storage(format!("{}: {}", path.display(), e)))?;

        debug!("Saved {} cart lines to {}", items.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemKind;
    use crate::money::{Currency, Price};

    fn line(id: &str) -> CartItem {
        CartItem::new(id, "Plugin", Price::new(4.5, Currency::USD), ItemKind::Plugin)
    }

    #[tokio::test]
    async fn test_memory_store_scopes() {
        let store = MemoryCartStore::new();
        let anon = CartScope::Anonymous("s1".into());
        let user = CartScope::User("s1".into());

        store.save(&anon, &[line("p1")]).await.unwrap();

        assert_eq!(store.load(&anon).await.unwrap().len(), 1);
        assert!(store.load(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path().join("carts"));
        let scope = CartScope::User("u/../1".into());

        assert!(store.load(&scope).await.unwrap().is_empty());

        store.save(&scope, &[line("p1"), line("p2")]).await.unwrap();
        let loaded = store.load(&scope).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].id, "p2");

        let file = store.path_for(&scope);
        assert!(file.starts_with(store.dir()));

        store.save(&scope, &[]).await.unwrap();
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_file_store_keeps_lookalike_scopes_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path());

        store
            .save(&CartScope::Anonymous("sess.1".into()), &[line("p1")])
            .await
            .unwrap();
        store
            .save(&CartScope::User("a.b".into()), &[line("p2")])
            .await
            .unwrap();

        for lookalike in [
            CartScope::Anonymous("sess_1".into()),
            CartScope::Anonymous("sess/1".into()),
            CartScope::User("a_b".into()),
            CartScope::Anonymous("a.b".into()),
        ] {
            assert!(
                store.load(&lookalike).await.unwrap().is_empty(),
                "{} saw another scope's lines",
                lookalike
            );
        }
        assert_eq!(store.load(&CartScope::User("a.b".into())).await.unwrap()[0].id, "p2");
    }
}
