//! Cancellation sources for in-flight inbound calls.

use crate::rpc::envelope::RequestId;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::debug;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct CancellationRegistry {
    active: DashMap<RequestId, (u64, CancellationToken)>,
    generation: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token under `id`. The registration is released when
    /// the returned guard drops, however the handler finishes.
    pub fn register(self: &Arc<Self>, id: RequestId) -> CancellationGuard {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.active.insert(id.clone(), (generation, token.clone()));
        CancellationGuard {
            registry: Arc::clone(self),
            id,
            generation,
            token,
        }
    }

    /// Cancel the call registered under `id`. Unknown ids are ignored.
    pub fn cancel(&self, id: &RequestId) -> bool {
        match self.active.get(id) {
            Some(entry) => {
                debug!("Cancelling inbound call {}", id);
                entry.value().1.cancel();
                true
            }
            None => {
                debug!("Cancel for unknown call {} ignored", id);
                false
            }
        }
    }

    pub fn cancel_all(&self) {
        for entry in self.active.iter() {
            entry.value().1.cancel();
        }
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.active.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

pub struct CancellationGuard {
    registry: Arc<CancellationRegistry>,
    id: RequestId,
    generation: u64,
    token: CancellationToken,
}

impl CancellationGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        // A reused id may have re-registered; only release our own entry.
        self.registry
            .active
            .remove_if(&self.id, |_, (generation, _)| *generation == self.generation);
    }
}
