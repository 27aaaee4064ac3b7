// Server-owned values mirrored to observers on every change.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;

// Per-value history kept for slow observers before they fall back to the latest value.
const CHANGE_BUFFER: usize = 64;

/// A single write to a replicated value as seen by one observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange<T> {
    pub seq: u64,
    pub old: T,
    pub new: T,
}

/// Latest value of a replica together with the sequence number that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub seq: u64,
    pub value: T,
}

#[derive(Debug, Clone)]
struct Write<T> {
    seq: u64,
    value: T,
}

/// A value with exactly one writer (the session that owns it).
///
/// Every accepted write bumps a per-value sequence number and is broadcast to all
/// subscribed mirrors. Writes that do not change the value are dropped, so observers
/// only ever see real transitions.
#[derive(Debug)]
pub struct Replicated<T> {
    field: &'static str,
    value: T,
    seq: u64,
    changes_tx: broadcast::Sender<Write<T>>,
    latest_tx: watch::Sender<Versioned<T>>,
}

impl<T> Replicated<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(field: &'static str, initial: T) -> Self {
        let (changes_tx, _changes_rx) = broadcast::channel(CHANGE_BUFFER);
        let (latest_tx, _latest_rx) = watch::channel(Versioned {
            seq: 0,
            value: initial.clone(),
        });
        Self {
            field,
            value: initial,
            seq: 0,
            changes_tx,
            latest_tx,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Writes a new value. Returns false when the value was already current.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }

        self.seq += 1;
        self.value = value;
        let write = Write {
            seq: self.seq,
            value: self.value.clone(),
        };
        // Nobody listening is fine; the watch below still keeps the latest value.
        let _ = self.changes_tx.send(write);
        self.latest_tx.send_replace(Versioned {
            seq: self.seq,
            value: self.value.clone(),
        });
        true
    }

    pub fn update(&mut self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.value);
        self.set(next)
    }

    /// Read-only handle that can create mirrors from any task.
    pub fn handle(&self) -> ReplicaHandle<T> {
        ReplicaHandle {
            field: self.field,
            changes_tx: self.changes_tx.clone(),
            latest_rx: self.latest_tx.subscribe(),
        }
    }

    /// Server-side observer of this value.
    pub fn subscribe(&self) -> Mirror<T> {
        self.handle().mirror(true)
    }
}

/// Cloneable, read-only access point to a replica.
#[derive(Debug, Clone)]
pub struct ReplicaHandle<T> {
    field: &'static str,
    changes_tx: broadcast::Sender<Write<T>>,
    latest_rx: watch::Receiver<Versioned<T>>,
}

impl<T> ReplicaHandle<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn current(&self) -> Versioned<T> {
        self.latest_rx.borrow().clone()
    }

    /// Creates a client-side mirror of the value.
    pub fn subscribe(&self) -> Mirror<T> {
        self.mirror(false)
    }

    fn mirror(&self, as_server: bool) -> Mirror<T> {
        // Subscribe to the change stream before reading the latest value so no write
        // can slip between the two.
        let changes_rx = self.changes_tx.subscribe();
        let latest_rx = self.latest_rx.clone();
        let latest = latest_rx.borrow().clone();
        Mirror {
            field: self.field,
            as_server,
            changes_rx,
            latest_rx,
            seq: latest.seq,
            value: latest.value,
        }
    }
}

/// Observer-side copy of a replicated value.
///
/// A mirror never applies a write older than the last one it saw, so its value is
/// monotonic in the writer's order even when it lags and resyncs.
#[derive(Debug)]
pub struct Mirror<T> {
    field: &'static str,
    as_server: bool,
    changes_rx: broadcast::Receiver<Write<T>>,
    latest_rx: watch::Receiver<Versioned<T>>,
    seq: u64,
    value: T,
}

impl<T> Mirror<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// True when this mirror observes on behalf of the authoritative writer.
    pub fn as_server(&self) -> bool {
        self.as_server
    }

    /// Waits for the next change. Returns `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<ValueChange<T>> {
        loop {
            match self.changes_rx.recv().await {
                Ok(write) => {
                    if let Some(change) = self.apply(write.seq, write.value) {
                        return Some(change);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(field = self.field, missed, "replica mirror lagged; resyncing");
                    if let Some(change) = self.resync() {
                        return Some(change);
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Mirror::changed`].
    pub fn try_changed(&mut self) -> Option<ValueChange<T>> {
        loop {
            match self.changes_rx.try_recv() {
                Ok(write) => {
                    if let Some(change) = self.apply(write.seq, write.value) {
                        return Some(change);
                    }
                }
                Err(TryRecvError::Lagged(_)) => {
                    if let Some(change) = self.resync() {
                        return Some(change);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn resync(&mut self) -> Option<ValueChange<T>> {
        let latest = self.latest_rx.borrow_and_update().clone();
        self.apply(latest.seq, latest.value)
    }

    fn apply(&mut self, seq: u64, value: T) -> Option<ValueChange<T>> {
        if seq <= self.seq {
            return None;
        }
        self.seq = seq;
        let old = std::mem::replace(&mut self.value, value.clone());
        Some(ValueChange {
            seq,
            old,
            new: value,
        })
    }
}
