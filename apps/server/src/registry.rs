//! Registry of live tunnels, keyed by subdomain.
//!
//! Mutated by control-channel acceptors (insert) and teardown (remove), read
//! by every proxy handler. A reader that obtained a tunnel handle keeps using
//! it for the duration of one request even if the tunnel is concurrently
//! removed; the request then observes teardown through its pending entry.

use axum::extract::ws::Message as WsMessage;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};
use wormhole_common::constants::SUBDOMAIN_RETRY_LIMIT;
use wormhole_common::protocol::Message;
use wormhole_common::utils::generate_subdomain;
use wormhole_common::{Result, TunnelError};

/// One live agent connection owning one subdomain.
///
/// The outbound channel is drained by a single writer task owning the socket
/// sink, so queued frames can never interleave on the wire.
pub struct Tunnel {
    pub tunnel_id: String,
    pub subdomain: String,
    outbound: mpsc::Sender<WsMessage>,
    pub created_at: DateTime<Utc>,
    request_count: AtomicU64,
    closed: AtomicBool,
}

impl Tunnel {
    fn new(subdomain: String, outbound: mpsc::Sender<WsMessage>) -> Self {
        Self {
            tunnel_id: uuid::Uuid::new_v4().to_string(),
            subdomain,
            outbound,
            created_at: Utc::now(),
            request_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Serialize a frame and hand it to the writer task.
    ///
    /// Suspends when the channel is full (backpressure). Fails once the tunnel
    /// has been closed or the writer is gone.
    pub async fn send_frame(&self, frame: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(TunnelError::TunnelGone);
        }

        let json = serde_json::to_string(frame)
            .map_err(|e| TunnelError::InternalError(format!("frame serialization: {e}")))?;

        self.outbound
            .send(WsMessage::Text(json))
            .await
            .map_err(|e| TunnelError::DispatchFailed(e.to_string()))
    }

    /// Queue a raw WebSocket message, bypassing the closed flag. Used by
    /// teardown to flush a close frame behind any frames already queued.
    pub(crate) async fn send_raw(&self, msg: WsMessage) {
        let _ = self.outbound.send(msg).await;
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Advanced only after the outbound frame has been handed to the channel
    pub fn incr_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Point-in-time view of one tunnel, for the status surface
#[derive(Debug, Clone, serde::Serialize)]
pub struct TunnelSnapshot {
    pub subdomain: String,
    pub tunnel_id: String,
    pub created_at: DateTime<Utc>,
    pub request_count: u64,
}

/// Mapping from subdomain to live tunnel
pub struct TunnelRegistry {
    tunnels: DashMap<String, Arc<Tunnel>>,
    /// tunnel_id -> subdomain, so removal by id is O(1)
    subdomains: DashMap<String, String>,
    max_tunnels: usize,
}

impl TunnelRegistry {
    pub fn new(max_tunnels: usize) -> Self {
        Self {
            tunnels: DashMap::new(),
            subdomains: DashMap::new(),
            max_tunnels,
        }
    }

    /// Allocate a fresh subdomain and insert a tunnel for it.
    ///
    /// Collisions are retried a bounded number of times; past the bound, and
    /// when the tunnel cap is reached, this fails with `Exhausted`.
    pub fn create(&self, outbound: mpsc::Sender<WsMessage>) -> Result<Arc<Tunnel>> {
        self.create_with(outbound, generate_subdomain)
    }

    fn create_with(
        &self,
        outbound: mpsc::Sender<WsMessage>,
        mut next_label: impl FnMut() -> String,
    ) -> Result<Arc<Tunnel>> {
        if self.tunnels.len() >= self.max_tunnels {
            return Err(TunnelError::Exhausted);
        }

        for _ in 0..SUBDOMAIN_RETRY_LIMIT {
            let subdomain = next_label();
            match self.tunnels.entry(subdomain.clone()) {
                Entry::Occupied(_) => {
                    debug!(%subdomain, "Subdomain collision, regenerating");
                    continue;
                }
                Entry::Vacant(slot) => {
                    let tunnel = Arc::new(Tunnel::new(subdomain.clone(), outbound));
                    self.subdomains
                        .insert(tunnel.tunnel_id.clone(), subdomain.clone());
                    slot.insert(tunnel.clone());
                    info!(%subdomain, tunnel_id = %tunnel.tunnel_id, "Tunnel created");
                    return Ok(tunnel);
                }
            }
        }

        Err(TunnelError::Exhausted)
    }

    /// O(1) lookup by subdomain
    pub fn lookup(&self, subdomain: &str) -> Option<Arc<Tunnel>> {
        self.tunnels.get(subdomain).map(|entry| entry.value().clone())
    }

    /// Idempotent removal by tunnel id.
    ///
    /// Marks the tunnel closed before unlinking it, so a pending registration
    /// racing with teardown is guaranteed to observe one or the other.
    pub fn remove(&self, tunnel_id: &str) -> Option<Arc<Tunnel>> {
        let (_, subdomain) = self.subdomains.remove(tunnel_id)?;
        let (_, tunnel) = self.tunnels.remove(&subdomain)?;
        tunnel.close();
        info!(%subdomain, %tunnel_id, "Tunnel removed");
        Some(tunnel)
    }

    pub fn count(&self) -> usize {
        self.tunnels.len()
    }

    /// Consistent-enough view for the status surface
    pub fn snapshot(&self) -> Vec<TunnelSnapshot> {
        self.tunnels
            .iter()
            .map(|entry| {
                let tunnel = entry.value();
                TunnelSnapshot {
                    subdomain: tunnel.subdomain.clone(),
                    tunnel_id: tunnel.tunnel_id.clone(),
                    created_at: tunnel.created_at,
                    request_count: tunnel.request_count(),
                }
            })
            .collect()
    }
}
