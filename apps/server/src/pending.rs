//! Table of outstanding public requests awaiting their agent reply.
//!
//! Each entry is a one-shot slot completed exactly once, by the first of:
//! reply, timeout, owning-tunnel teardown, or caller cancellation. Entries are
//! keyed by request id and carry the owning tunnel's id as a plain scalar so
//! teardown can sweep them without back-pointers.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;
use wormhole_common::protocol::HttpResponse;
use wormhole_common::{Result, TunnelError};

use crate::registry::Tunnel;

type ReplySlot = oneshot::Sender<Result<HttpResponse>>;

struct PendingEntry {
    tunnel_id: String,
    slot: ReplySlot,
}

/// Concurrent map of request id to reply slot
pub struct PendingRequests {
    entries: Arc<DashMap<String, PendingEntry>>,
    dropped_replies: AtomicU64,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            dropped_replies: AtomicU64::new(0),
        }
    }

    /// Insert a pending entry and return the handle its owner will await,
    /// up to the absolute `deadline`.
    ///
    /// Duplicate request ids are rejected (id generation makes them
    /// impossible, but the table enforces it anyway). Registration against a
    /// tunnel already torn down is rejected with `TunnelGone`: the entry is
    /// inserted first and the closed flag re-checked after, so teardown either
    /// sees the entry when sweeping or this sees the flag.
    pub fn register(
        &self,
        request_id: &str,
        tunnel: &Tunnel,
        deadline: Instant,
    ) -> Result<ReplyHandle> {
        let (tx, rx) = oneshot::channel();

        match self.entries.entry(request_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(TunnelError::InternalError(format!(
                    "duplicate request id: {request_id}"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry {
                    tunnel_id: tunnel.tunnel_id.clone(),
                    slot: tx,
                });
            }
        }

        if tunnel.is_closed() {
            self.entries.remove(request_id);
            return Err(TunnelError::TunnelGone);
        }

        Ok(ReplyHandle {
            request_id: request_id.to_string(),
            entries: self.entries.clone(),
            rx,
            deadline,
        })
    }

    /// Complete the slot for `request_id` with a reply.
    ///
    /// Returns false when there is nothing to complete: unknown id, already
    /// completed, or the waiter has gone away. Such replies are dropped.
    pub fn fulfill(&self, request_id: &str, response: HttpResponse) -> bool {
        let delivered = match self.entries.remove(request_id) {
            Some((_, entry)) => entry.slot.send(Ok(response)).is_ok(),
            None => false,
        };

        if !delivered {
            self.dropped_replies.fetch_add(1, Ordering::Relaxed);
            debug!(%request_id, "Dropping reply with no matching pending request");
        }
        delivered
    }

    /// Fail every entry belonging to `tunnel_id`, used at tunnel teardown
    pub fn fail_all_for(&self, tunnel_id: &str, error: TunnelError) {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().tunnel_id == tunnel_id)
            .map(|entry| entry.key().clone())
            .collect();

        for request_id in matching {
            // Request ids are never reused, so this entry is still ours
            if let Some((_, entry)) = self.entries.remove(&request_id) {
                let _ = entry.slot.send(Err(error.clone()));
            }
        }
    }

    /// Caller-initiated cancellation: unblocks the waiter with `Cancelled`
    /// and removes the entry. A later reply for this id is dropped.
    pub fn cancel(&self, request_id: &str) {
        if let Some((_, entry)) = self.entries.remove(request_id) {
            let _ = entry.slot.send(Err(TunnelError::Cancelled));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replies that referenced an unknown or already-completed request id
    pub fn dropped_reply_count(&self) -> u64 {
        self.dropped_replies.load(Ordering::Relaxed)
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

/// Waiter side of one pending entry.
///
/// Dropping the handle unregisters the entry, so a proxy handler that goes
/// away (public client disconnect) cleans up without a separate call.
pub struct ReplyHandle {
    request_id: String,
    entries: Arc<DashMap<String, PendingEntry>>,
    rx: oneshot::Receiver<Result<HttpResponse>>,
    deadline: Instant,
}

impl ReplyHandle {
    /// Block until the first of: reply, failure, or the registration deadline.
    pub async fn await_reply(mut self) -> Result<HttpResponse> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(result)) => result,
            // Sender dropped without completing; only reachable if the table
            // itself went away, which teardown maps to the same outcome
            Ok(Err(_)) => Err(TunnelError::TunnelGone),
            Err(_) => Err(TunnelError::Timeout),
        }
    }
}

impl Drop for ReplyHandle {
    fn drop(&mut self) {
        self.entries.remove(&self.request_id);
    }
}
