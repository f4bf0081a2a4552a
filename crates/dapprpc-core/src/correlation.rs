//! Correlation table: request id → pending call.
//!
//! Each pending call owns the sending half of a `oneshot` channel; settling
//! removes the entry and fires the channel, so a call settles at most once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::ProviderError;

/// Outcome delivered to a waiting caller.
pub type Settlement = Result<Value, ProviderError>;

struct PendingCall {
    method: String,
    created_at: Instant,
    tx: oneshot::Sender<Settlement>,
}

/// Maps in-flight request ids to their waiting callers.
///
/// Ids start at 0 and increase by one per allocation for the lifetime of the
/// table. They are never reset, so a stale response can never match a newer call.
#[derive(Default)]
pub struct CorrelationTable {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingCall>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending call and return its id plus the receiver that
    /// will observe its settlement.
    pub fn allocate(&self, method: &str) -> (u64, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().unwrap().insert(
            id,
            PendingCall {
                method: method.to_string(),
                created_at: Instant::now(),
                tx,
            },
        );
        (id, rx)
    }

    /// Settle `id` successfully. Returns `false` (and does nothing) if `id` is
    /// not pending.
    pub fn resolve(&self, id: u64, result: Value) -> bool {
        self.settle(id, Ok(result))
    }

    /// Settle `id` with an error. Returns `false` if `id` is not pending.
    pub fn reject(&self, id: u64, error: ProviderError) -> bool {
        self.settle(id, Err(error))
    }

    fn settle(&self, id: u64, outcome: Settlement) -> bool {
        let Some(call) = self.pending.lock().unwrap().remove(&id) else {
            return false;
        };
        tracing::trace!(
            id,
            method = %call.method,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "settling pending call"
        );
        // The caller may have stopped waiting; that is not an error here.
        let _ = call.tx.send(outcome);
        true
    }

    /// Drop `id` without settling it.
    pub fn remove(&self, id: u64) -> bool {
        self.pending.lock().unwrap().remove(&id).is_some()
    }

    /// Reject every pending call with an error built by `make_error`.
    /// Returns the number of calls rejected.
    pub fn reject_all(&self, make_error: impl Fn() -> ProviderError) -> usize {
        let drained: Vec<PendingCall> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().map(|(_, call)| call).collect()
        };
        let count = drained.len();
        for call in drained {
            let _ = call.tx.send(Err(make_error()));
        }
        count
    }

    /// Ids of calls that have been waiting longer than `age`.
    pub fn older_than(&self, age: Duration) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .pending
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, call)| call.created_at.elapsed() >= age)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn contains(&self, id: u64) -> bool {
        self.pending.lock().unwrap().contains_key(&id)
    }

    /// The id the next allocation will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_start_at_zero_and_increase() {
        let table = CorrelationTable::new();
        let (a, _ra) = table.allocate("eth_chainId");
        let (b, _rb) = table.allocate("eth_blockNumber");
        let (c, _rc) = table.allocate("eth_accounts");
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn ids_are_never_reused_after_settlement() {
        let table = CorrelationTable::new();
        let (a, _ra) = table.allocate("eth_chainId");
        assert!(table.resolve(a, json!("0x1")));
        let (b, _rb) = table.allocate("eth_chainId");
        assert_ne!(a, b);
        assert_eq!(table.next_id(), 2);
    }

    #[test]
    fn resolve_fires_once_and_removes() {
        let table = CorrelationTable::new();
        let (id, mut rx) = table.allocate("eth_chainId");
        assert!(table.resolve(id, json!("0x1")));
        assert!(!table.contains(id));
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!("0x1"));

        // second settlement is a no-op
        assert!(!table.resolve(id, json!("0x2")));
        assert!(!table.reject(id, ProviderError::Closed));
    }

    #[test]
    fn reject_delivers_error() {
        let table = CorrelationTable::new();
        let (id, mut rx) = table.allocate("eth_sendTransaction");
        assert!(table.reject(id, ProviderError::Timeout { ms: 10 }));
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { ms: 10 }));
    }

    #[test]
    fn unknown_id_is_noop() {
        let table = CorrelationTable::new();
        assert!(!table.resolve(42, json!(null)));
        assert!(table.is_empty());
    }

    #[test]
    fn resolve_after_receiver_dropped_still_removes() {
        let table = CorrelationTable::new();
        let (id, rx) = table.allocate("eth_chainId");
        drop(rx);
        assert!(table.resolve(id, json!("0x1")));
        assert!(table.is_empty());
    }

    #[test]
    fn reject_all_sweeps_everything() {
        let table = CorrelationTable::new();
        let (_, mut r1) = table.allocate("a_b");
        let (_, mut r2) = table.allocate("c_d");
        let swept = table.reject_all(|| ProviderError::Disconnected {
            code: 1006,
            reason: "Abnormal Closure".into(),
        });
        assert_eq!(swept, 2);
        assert!(table.is_empty());
        assert!(r1.try_recv().unwrap().is_err());
        assert!(r2.try_recv().unwrap().is_err());
    }

    #[test]
    fn older_than_zero_lists_all_sorted() {
        let table = CorrelationTable::new();
        let _keep: Vec<_> = (0..3).map(|_| table.allocate("eth_chainId").1).collect();
        assert_eq!(table.older_than(Duration::ZERO), vec![0, 1, 2]);
        assert!(table.older_than(Duration::from_secs(3600)).is_empty());
    }
}
