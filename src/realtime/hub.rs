//! In-memory notification hub keyed by resource id.
//!
//! Waiters register a single-slot ticket and block until a pulse, a
//! deadline or cancellation. Delivery is best-effort: a ticket whose slot
//! is already occupied simply misses the extra pulse.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

type WaiterMap = HashMap<String, HashMap<u64, mpsc::Sender<()>>>;

/// How a wait resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
    Canceled,
}

/// Handle to the shared waiter map. Cloning is cheap.
#[derive(Clone, Default)]
pub struct Hub {
    waiters: Arc<Mutex<WaiterMap>>,
    next_id: Arc<AtomicU64>,
}

/// A one-shot registration for at most one wake-up pulse.
///
/// Dropping the ticket removes it from the hub.
pub struct WaitTicket {
    hub: Hub,
    resource_id: String,
    id: u64,
    rx: mpsc::Receiver<()>,
}

impl WaitTicket {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

impl Drop for WaitTicket {
    fn drop(&mut self) {
        self.hub.unregister(&self.resource_id, self.id);
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WaiterMap> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a fresh ticket under `resource_id`.
    pub fn register(&self, resource_id: &str) -> WaitTicket {
        let (tx, rx) = mpsc::channel(1);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock()
            .entry(resource_id.to_string())
            .or_default()
            .insert(id, tx);

        trace!(resource_id, ticket = id, "Registered wait ticket");
        WaitTicket {
            hub: self.clone(),
            resource_id: resource_id.to_string(),
            id,
            rx,
        }
    }

    /// Pulse every ticket registered under `resource_id`, then clear the list.
    ///
    /// Returns the number of tickets that received a pulse.
    pub fn notify(&self, resource_id: &str) -> usize {
        let Some(senders) = self.lock().remove(resource_id) else {
            return 0;
        };

        let total = senders.len();
        let delivered = senders
            .into_values()
            .filter(|tx| tx.try_send(()).is_ok())
            .count();

        debug!(resource_id, delivered, total, "Notified waiters");
        delivered
    }

    /// Block until the ticket is pulsed, `deadline` passes, or `cancel` fires.
    pub async fn wait(
        &self,
        mut ticket: WaitTicket,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitOutcome::Canceled,
            // A closed channel also means "check again"; the caller re-reads state anyway.
            _ = ticket.rx.recv() => WaitOutcome::Signaled,
            _ = sleep_until(deadline) => WaitOutcome::TimedOut,
        };

        trace!(resource_id = ticket.resource_id(), ?outcome, "Wait resolved");
        outcome
    }

    /// Number of tickets currently registered under `resource_id`.
    pub fn waiter_count(&self, resource_id: &str) -> usize {
        self.lock().get(resource_id).map_or(0, HashMap::len)
    }

    /// Total tickets ever registered on this hub.
    #[cfg(test)]
    pub fn registrations(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    fn unregister(&self, resource_id: &str, id: u64) {
        let mut map = self.lock();
        if let Some(tickets) = map.get_mut(resource_id) {
            tickets.remove(&id);
            if tickets.is_empty() {
                map.remove(resource_id);
            }
        }
    }
}
