//! Stream-to-callback subscription registry.

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

type Callback = Arc<dyn Fn(Value) -> BoxFuture<'static, sirocco_core::Result<()>> + Send + Sync>;

/// Maps stream keys to async callbacks.
///
/// Keys match exactly; adapters normalize incoming messages to the
/// same key they were registered under (e.g. `btcusdt@aggTrade`,
/// `orderbook.50.BTCUSDT`). Messages for unknown keys are dropped with
/// a debug log, and callback errors are logged and swallowed so one
/// bad handler cannot take down the receive loop.
#[derive(Default)]
pub struct SubscriptionRegistry {
    callbacks: RwLock<HashMap<String, Callback>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for a stream key, replacing any existing
    /// callback for the same key.
    pub fn insert<F, Fut>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = sirocco_core::Result<()>> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |value| Box::pin(callback(value)));
        self.callbacks.write().insert(key.into(), callback);
    }

    /// Removes a callback. Returns false if the key was not registered.
    pub fn remove(&self, key: &str) -> bool {
        self.callbacks.write().remove(key).is_some()
    }

    /// Returns true if a callback is registered for the key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.callbacks.read().contains_key(key)
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns true if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Dispatches a message to the callback registered for the key.
    ///
    /// Unmatched keys are dropped with a debug log. Callback errors
    /// are logged and swallowed.
    pub async fn dispatch(&self, key: &str, message: Value) {
        let callback = self.callbacks.read().get(key).cloned();
        match callback {
            Some(callback) => {
                if let Err(e) = callback(message).await {
                    error!(key, error = %e, "subscription callback failed");
                }
            }
            None => {
                debug!(key, "dropping message for unsubscribed stream");
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn dispatches_to_matching_key() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits2 = Arc::clone(&hits);
        registry.insert("btcusdt@aggTrade", move |msg| {
            let hits = Arc::clone(&hits2);
            async move {
                assert_eq!(msg["p"], "50000.0");
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        registry
            .dispatch("btcusdt@aggTrade", json!({"p": "50000.0"}))
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unmatched_key_is_dropped() {
        let registry = SubscriptionRegistry::new();
        registry.insert("a", |_| async { Ok(()) });

        // must not panic or error
        registry.dispatch("b", json!({})).await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn insert_overwrites_existing_key() {
        let registry = SubscriptionRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&first);
        registry.insert("k", move |_| {
            let f = Arc::clone(&f);
            async move {
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let s = Arc::clone(&second);
        registry.insert("k", move |_| {
            let s = Arc::clone(&s);
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        registry.dispatch("k", json!({})).await;
        assert_eq!(registry.len(), 1);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_error_is_swallowed() {
        let registry = SubscriptionRegistry::new();
        registry.insert("k", |_| async {
            Err(sirocco_core::NetworkError::ConnectionClosed {
                reason: "callback failure".to_string(),
            }
            .into())
        });

        registry.dispatch("k", json!({})).await;
        // registry is still usable
        assert!(registry.contains("k"));
    }

    #[tokio::test]
    async fn remove_returns_presence() {
        let registry = SubscriptionRegistry::new();
        registry.insert("k", |_| async { Ok(()) });

        assert!(registry.remove("k"));
        assert!(!registry.remove("k"));
        assert!(registry.is_empty());
    }
}
