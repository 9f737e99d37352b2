//! Peer registry — the in-memory peer table.
//!
//! Keyed by canonical base URL. Liveness is derived from `last_seen` at
//! read time against the staleness window, never stored, so a registry
//! snapshot is always consistent with the clock it was taken at. The
//! registry is shared between the HTTP handlers and the background loops;
//! all methods take `&self` and lock internally.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use relaynet_messages::PeerInfo;
use relaynet_store::StoredPeer;
use relaynet_types::Timestamp;

use crate::url::canonical_peer_url;
use crate::NetworkError;

/// Per-peer state tracked by the registry.
#[derive(Clone, Debug)]
pub struct PeerEntry {
    pub url: String,
    /// Unix seconds of the last successful contact.
    pub last_seen_secs: u64,
}

/// Central peer table.
pub struct PeerRegistry {
    /// All known peers keyed by canonical base URL.
    peers: RwLock<HashMap<String, PeerEntry>>,
    /// This node's own canonical URL; never admitted as a peer.
    self_url: Option<String>,
    /// Seconds of silence after which a peer stops counting as online
    /// (and drops out of the quorum denominator).
    stale_after_secs: u64,
    /// Seconds of silence after which a peer is forgotten entirely.
    prune_after_secs: u64,
}

impl PeerRegistry {
    /// Create a registry. `self_url` is canonicalized if present; an
    /// invalid own URL is a config error surfaced at startup.
    pub fn new(
        self_url: Option<&str>,
        stale_after_secs: u64,
        prune_after_secs: u64,
    ) -> Result<Self, NetworkError> {
        let self_url = match self_url {
            Some(raw) => Some(canonical_peer_url(raw)?),
            None => None,
        };
        Ok(Self {
            peers: RwLock::new(HashMap::new()),
            self_url,
            stale_after_secs,
            prune_after_secs,
        })
    }

    /// This node's canonical URL, if configured.
    pub fn self_url(&self) -> Option<&str> {
        self.self_url.as_deref()
    }

    // -- Peer lifecycle --------------------------------------------------------

    /// Insert or refresh a peer. Returns `true` when the peer is new.
    ///
    /// The URL is canonicalized; invalid URLs are rejected with the reason.
    /// Registering the node's own URL is ignored rather than rejected, so a
    /// careless bootstrap list cannot make a node gossip to itself.
    pub async fn register(&self, raw_url: &str, now: Timestamp) -> Result<bool, NetworkError> {
        let url = canonical_peer_url(raw_url)?;
        if self.self_url.as_deref() == Some(url.as_str()) {
            tracing::debug!(%url, "ignoring self-registration");
            return Ok(false);
        }

        let mut peers = self.peers.write().await;
        let inserted = !peers.contains_key(&url);
        peers.insert(
            url.clone(),
            PeerEntry {
                url,
                last_seen_secs: now.as_secs(),
            },
        );
        Ok(inserted)
    }

    /// Refresh `last_seen` for a known peer. Unknown URLs are ignored —
    /// contact alone does not grant registry membership.
    pub async fn touch(&self, url: &str, now: Timestamp) {
        let Ok(url) = canonical_peer_url(url) else {
            return;
        };
        let mut peers = self.peers.write().await;
        if let Some(entry) = peers.get_mut(&url) {
            entry.last_seen_secs = now.as_secs();
        }
    }

    /// Drop one peer.
    pub async fn remove(&self, url: &str) {
        let Ok(url) = canonical_peer_url(url) else {
            return;
        };
        self.peers.write().await.remove(&url);
    }

    /// Forget peers silent for longer than the prune window. Returns the
    /// removed URLs so the caller can delete the persisted rows too.
    pub async fn prune(&self, now: Timestamp) -> Vec<String> {
        let cutoff = now.as_secs().saturating_sub(self.prune_after_secs);
        let mut peers = self.peers.write().await;
        let doomed: Vec<String> = peers
            .values()
            .filter(|p| p.last_seen_secs < cutoff)
            .map(|p| p.url.clone())
            .collect();
        for url in &doomed {
            peers.remove(url);
        }
        doomed
    }

    // -- Queries ---------------------------------------------------------------

    fn is_online(&self, entry: &PeerEntry, now: Timestamp) -> bool {
        now.as_secs().saturating_sub(entry.last_seen_secs) < self.stale_after_secs
    }

    /// Number of known peers.
    pub async fn count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Number of non-stale peers — the peer share of the quorum
    /// denominator.
    pub async fn online_count(&self, now: Timestamp) -> usize {
        let peers = self.peers.read().await;
        peers.values().filter(|p| self.is_online(p, now)).count()
    }

    /// Whether a URL is currently registered.
    pub async fn is_known(&self, url: &str) -> bool {
        let Ok(url) = canonical_peer_url(url) else {
            return false;
        };
        self.peers.read().await.contains_key(&url)
    }

    /// Snapshot of every known peer with derived online status.
    pub async fn known_peers(&self, now: Timestamp) -> Vec<PeerInfo> {
        let peers = self.peers.read().await;
        let mut list: Vec<PeerInfo> = peers
            .values()
            .map(|p| PeerInfo {
                url: p.url.clone(),
                last_seen: p.last_seen_secs,
                online: self.is_online(p, now),
            })
            .collect();
        list.sort_by(|a, b| a.url.cmp(&b.url));
        list
    }

    /// URLs of all non-stale peers.
    pub async fn online_urls(&self, now: Timestamp) -> Vec<String> {
        let peers = self.peers.read().await;
        let mut list: Vec<String> = peers
            .values()
            .filter(|p| self.is_online(p, now))
            .map(|p| p.url.clone())
            .collect();
        list.sort();
        list
    }

    /// Up to `count` random non-stale peers, for replication targeting.
    pub async fn random_online(&self, count: usize, now: Timestamp) -> Vec<String> {
        let mut urls = {
            let peers = self.peers.read().await;
            peers
                .values()
                .filter(|p| self.is_online(p, now))
                .map(|p| p.url.clone())
                .collect::<Vec<String>>()
        };
        urls.shuffle(&mut rand::thread_rng());
        urls.truncate(count);
        urls
    }

    // -- Persistence -----------------------------------------------------------

    /// Seed the registry from persisted rows at startup. Entries that fail
    /// canonicalization or collide with the own URL are skipped.
    pub async fn hydrate(&self, stored: Vec<StoredPeer>) -> usize {
        let mut peers = self.peers.write().await;
        let mut loaded = 0;
        for peer in stored {
            let Ok(url) = canonical_peer_url(&peer.url) else {
                tracing::warn!(url = %peer.url, "skipping persisted peer with invalid url");
                continue;
            };
            if self.self_url.as_deref() == Some(url.as_str()) {
                continue;
            }
            peers.insert(
                url.clone(),
                PeerEntry {
                    url,
                    last_seen_secs: peer.last_seen,
                },
            );
            loaded += 1;
        }
        loaded
    }

    /// Snapshot for mirroring into the peer store.
    pub async fn snapshot(&self) -> Vec<StoredPeer> {
        let peers = self.peers.read().await;
        peers
            .values()
            .map(|p| StoredPeer {
                url: p.url.clone(),
                last_seen: p.last_seen_secs,
            })
            .collect()
    }
}
