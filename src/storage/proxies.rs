//! Node address → proxy address directory.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::observability::metrics;
use crate::storage::kv::{KvStore, StoreResult};

/// Durable mapping from consensus node addresses to reachable proxies.
#[derive(Clone)]
pub struct ProxyDirectory {
    store: Arc<dyn KvStore>,
}

impl ProxyDirectory {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Proxy for `node`; `Ok(None)` on a miss.
    pub fn get(&self, node: &str) -> StoreResult<Option<String>> {
        self.store.get(node)
    }

    /// Insert or overwrite the mapping for `node`.
    pub fn put(&self, node: &str, proxy: &str) -> StoreResult<()> {
        self.store.put(node, proxy)?;
        metrics::record_proxy_mutation("put");
        tracing::info!(node = %node, proxy = %proxy, "Proxy mapping stored");
        Ok(())
    }

    /// Remove the mapping for `node`, returning the proxy it pointed to.
    pub fn remove(&self, node: &str) -> StoreResult<Option<String>> {
        let removed = self.store.remove(node)?;
        if let Some(proxy) = &removed {
            metrics::record_proxy_mutation("remove");
            tracing::info!(node = %node, proxy = %proxy, "Proxy mapping removed");
        }
        Ok(removed)
    }

    /// Move `old_node`'s mapping to `new_node` with a new proxy address.
    ///
    /// Both halves commit together: a failed rename leaves `old_node` mapped.
    pub fn rename(&self, old_node: &str, new_node: &str, proxy: &str) -> StoreResult<()> {
        if old_node == new_node {
            return self.put(new_node, proxy);
        }
        self.store.replace(old_node, new_node, proxy)?;
        metrics::record_proxy_mutation("rename");
        tracing::info!(from = %old_node, to = %new_node, proxy = %proxy, "Proxy mapping renamed");
        Ok(())
    }

    /// Every mapping, ordered by node address.
    pub fn list(&self) -> StoreResult<BTreeMap<String, String>> {
        self.store.range()
    }
}
