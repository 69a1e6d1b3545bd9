//! Correlation table: at most one pending wait per operation tag, plus the
//! last unclaimed envelope per tag.
//!
//! The table is plain data behind the dispatcher's mutex. Resolving a taken
//! wait happens after the lock is released, so nothing here awaits.

use std::collections::HashMap;

use tokio::sync::{oneshot, watch};

use modwss_core::protocol::Envelope;

/// How a pending wait ends when it does not time out.
#[derive(Debug)]
pub enum Resolution {
    Delivered(Envelope),
    Cancelled,
}

/// One registered waiter.
///
/// Dropping it (on resolve, timeout or removal) closes `released`, which is
/// what callers queued behind it wait on.
#[derive(Debug)]
pub struct PendingWait {
    id: u64,
    tx: oneshot::Sender<Resolution>,
    released: watch::Sender<()>,
}

impl PendingWait {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Hand the resolution to the waiter. Gives it back if the waiter is gone.
    pub fn resolve(self, resolution: Resolution) -> Result<(), Resolution> {
        self.tx.send(resolution)
    }
}

/// Outcome of `register`.
#[derive(Debug)]
pub enum Registration {
    Registered {
        id: u64,
        rx: oneshot::Receiver<Resolution>,
    },
    /// Another wait holds the tag; `released` closes when it is gone.
    /// `epoch` is the drain count at the time of the attempt.
    Occupied {
        released: watch::Receiver<()>,
        epoch: u64,
    },
}

/// Where an inbound envelope went.
#[derive(Debug)]
pub enum Delivery {
    Waiter(PendingWait, Envelope),
    Cached { replaced: bool },
}

#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: HashMap<String, PendingWait>,
    unhandled: HashMap<String, Envelope>,
    next_id: u64,
    // bumped by every drain
    epoch: u64,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for `operation`, unless one already exists.
    pub fn register(&mut self, operation: &str) -> Registration {
        if let Some(existing) = self.pending.get(operation) {
            return Registration::Occupied {
                released: existing.released.subscribe(),
                epoch: self.epoch,
            };
        }

        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = oneshot::channel();
        let (released, _) = watch::channel(());
        self.pending.insert(
            operation.to_string(),
            PendingWait {
                id,
                tx,
                released,
            },
        );
        Registration::Registered { id, rx }
    }

    /// Remove the wait for `operation` only if it is still registration `id`.
    pub fn remove(&mut self, operation: &str, id: u64) -> bool {
        match self.pending.get(operation) {
            Some(w) if w.id == id => self.pending.remove(operation).is_some(),
            _ => false,
        }
    }

    /// Take whatever wait holds `operation`.
    pub fn take_pending(&mut self, operation: &str) -> Option<PendingWait> {
        self.pending.remove(operation)
    }

    /// Give the envelope to its waiter, or keep it as the tag's latest unclaimed one.
    pub fn deliver(&mut self, envelope: Envelope) -> Delivery {
        match self.pending.remove(&envelope.operation) {
            Some(wait) => Delivery::Waiter(wait, envelope),
            None => Delivery::Cached {
                replaced: self.stash(envelope),
            },
        }
    }

    /// Last-write-wins insert into the unhandled cache.
    pub fn stash(&mut self, envelope: Envelope) -> bool {
        self.unhandled
            .insert(envelope.operation.clone(), envelope)
            .is_some()
    }

    /// One-shot claim of a cached envelope.
    pub fn take_unhandled(&mut self, operation: &str) -> Option<Envelope> {
        self.unhandled.remove(operation)
    }

    /// Empty both maps, returning the waits for the caller to cancel.
    /// Callers queued before this call see a new `epoch()` and must not re-register.
    pub fn drain(&mut self) -> Vec<PendingWait> {
        self.epoch += 1;
        self.unhandled.clear();
        self.pending.drain().map(|(_, w)| w).collect()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_waiting(&self, operation: &str) -> bool {
        self.pending.contains_key(operation)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn unhandled_len(&self) -> usize {
        self.unhandled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(op: &str, body: &str) -> Envelope {
        Envelope::new(op, serde_json::value::RawValue::from_string(body.into()).ok())
    }

    fn registered(r: Registration) -> (u64, oneshot::Receiver<Resolution>) {
        match r {
            Registration::Registered { id, rx } => (id, rx),
            Registration::Occupied { .. } => panic!("expected a fresh registration"),
        }
    }

    #[test]
    fn second_register_is_occupied_until_first_goes() {
        let mut t = CorrelationTable::new();
        let (id, _rx) = registered(t.register("a"));

        let Registration::Occupied { released, .. } = t.register("a") else {
            panic!("second waiter must queue");
        };
        assert_eq!(t.pending_len(), 1);
        assert!(released.has_changed().is_ok());

        assert!(t.remove("a", id));
        assert!(released.has_changed().is_err());
        let _ = registered(t.register("a"));
    }

    #[test]
    fn remove_ignores_stale_ids() {
        let mut t = CorrelationTable::new();
        let (first, _rx1) = registered(t.register("a"));
        assert!(t.remove("a", first));
        let (second, _rx2) = registered(t.register("a"));

        assert!(!t.remove("a", first));
        assert!(t.is_waiting("a"));
        assert!(t.remove("a", second));
    }

    #[test]
    fn deliver_prefers_waiter_then_caches_last_write() {
        let mut t = CorrelationTable::new();
        let (_, mut rx) = registered(t.register("a"));

        match t.deliver(env("a", "1")) {
            Delivery::Waiter(w, e) => assert!(w.resolve(Resolution::Delivered(e)).is_ok()),
            Delivery::Cached { .. } => panic!("waiter present"),
        }
        assert!(matches!(rx.try_recv(), Ok(Resolution::Delivered(_))));
        assert!(!t.is_waiting("a"));

        assert!(matches!(t.deliver(env("a", "2")), Delivery::Cached { replaced: false }));
        assert!(matches!(t.deliver(env("a", "3")), Delivery::Cached { replaced: true }));
        assert_eq!(t.unhandled_len(), 1);

        let cached = t.take_unhandled("a").map(|e| e.context_json().to_string());
        assert_eq!(cached.as_deref(), Some("3"));
        assert!(t.take_unhandled("a").is_none());
    }

    #[test]
    fn drain_empties_everything() {
        let mut t = CorrelationTable::new();
        let (_, _rx_a) = registered(t.register("a"));
        let (_, _rx_b) = registered(t.register("b"));
        t.stash(env("c", "{}"));

        let Registration::Occupied { epoch, .. } = t.register("a") else {
            panic!("second waiter must queue");
        };
        let drained = t.drain();
        assert_eq!(drained.len(), 2);
        assert_ne!(t.epoch(), epoch);
        assert_eq!(t.pending_len(), 0);
        assert_eq!(t.unhandled_len(), 0);
    }

    #[test]
    fn resolve_hands_back_when_waiter_dropped() {
        let mut t = CorrelationTable::new();
        let (_, rx) = registered(t.register("a"));
        drop(rx);

        let wait = t.take_pending("a").map(|w| w.resolve(Resolution::Cancelled));
        assert!(matches!(wait, Some(Err(Resolution::Cancelled))));
    }
}
