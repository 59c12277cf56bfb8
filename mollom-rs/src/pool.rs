//! Server pool
//!
//! Keeps, per public key, the ordered list of servers requests are sent to.
//! Lists are swapped whole and never edited in place.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_BOOTSTRAP_SERVERS;
use crate::error::Result;

/// Server list for one public key
#[derive(Debug, Clone)]
struct PoolEntry {
    servers: Arc<Vec<String>>,
    refreshed_at: Option<Instant>,
}

impl PoolEntry {
    fn new(servers: Arc<Vec<String>>) -> Self {
        Self {
            servers,
            refreshed_at: None,
        }
    }
}

/// Per-key server lists shared by every client built on this pool
#[derive(Debug)]
pub struct ServerPool {
    entries: RwLock<HashMap<String, PoolEntry>>,
    bootstrap: Arc<Vec<String>>,
}

impl ServerPool {
    /// Create a pool seeded from the given servers
    pub fn new(bootstrap: Vec<String>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            bootstrap: Arc::new(bootstrap),
        }
    }

    /// Servers used before the service has handed out a list
    pub fn bootstrap(&self) -> Arc<Vec<String>> {
        self.bootstrap.clone()
    }

    /// Current list for `public_key`, seeded from the bootstrap servers on
    /// first use.
    ///
    /// An exhausted list stays empty until the next [`refresh`](Self::refresh).
    pub async fn current(&self, public_key: &str) -> Arc<Vec<String>> {
        if let Some(entry) = self.entries.read().await.get(public_key) {
            return entry.servers.clone();
        }

        let mut entries = self.entries.write().await;
        let entry = entries.entry(public_key.to_string()).or_insert_with(|| {
            debug!("Seeding server list for {} from bootstrap", public_key);
            PoolEntry::new(self.bootstrap.clone())
        });
        entry.servers.clone()
    }

    /// Replace the list for `public_key`.
    ///
    /// The bootstrap list is stored first, so concurrent callers have somewhere
    /// to go while `fetch` runs. A non-empty fetch result then replaces it; an
    /// empty result or an error keeps the bootstrap list.
    pub async fn refresh<F, Fut>(&self, public_key: &str, fetch: F) -> Arc<Vec<String>>
    where
        F: FnOnce(Arc<Vec<String>>) -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        self.store(public_key, self.bootstrap.clone()).await;

        let servers = match fetch(self.bootstrap.clone()).await {
            Ok(servers) if !servers.is_empty() => {
                info!(
                    "Refreshed server list for {}: {} servers",
                    public_key,
                    servers.len()
                );
                Arc::new(servers)
            }
            Ok(_) => {
                warn!("Empty server list for {}, using bootstrap servers", public_key);
                self.bootstrap.clone()
            }
            Err(e) => {
                warn!(
                    "Server list refresh for {} failed: {}, using bootstrap servers",
                    public_key, e
                );
                self.bootstrap.clone()
            }
        };

        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(public_key.to_string())
            .or_insert_with(|| PoolEntry::new(servers.clone()));
        entry.servers = servers.clone();
        entry.refreshed_at = Some(Instant::now());
        servers
    }

    /// Mark every server for `public_key` as unreachable
    pub async fn exhaust(&self, public_key: &str) {
        self.store(public_key, Arc::new(Vec::new())).await;
    }

    /// When the list for `public_key` was last refreshed
    pub async fn refreshed_at(&self, public_key: &str) -> Option<Instant> {
        self.entries
            .read()
            .await
            .get(public_key)
            .and_then(|entry| entry.refreshed_at)
    }

    async fn store(&self, public_key: &str, servers: Arc<Vec<String>>) {
        let mut entries = self.entries.write().await;
        entries
            .entry(public_key.to_string())
            .and_modify(|entry| entry.servers = servers.clone())
            .or_insert_with(|| PoolEntry::new(servers));
    }
}

impl Default for ServerPool {
    fn default() -> Self {
        Self::new(DEFAULT_BOOTSTRAP_SERVERS.iter().map(|s| s.to_string()).collect())
    }
}
