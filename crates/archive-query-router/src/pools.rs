use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One pool replica plus an in-flight counter, so the group can pick the
/// least-busy replica (spec §4.9: "least-in-flight across replicas").
struct TrackedReplica<T> {
    inner: Arc<T>,
    in_flight: AtomicUsize,
}

/// RAII lease: increments the replica's in-flight counter on checkout,
/// decrements on drop regardless of how the caller's future completes
/// (spec §5: "no transaction state outlives a checkout").
pub struct PoolLease<T> {
    replica: Arc<TrackedReplica<T>>,
}

impl<T> PoolLease<T> {
    pub fn get(&self) -> &T {
        &self.replica.inner
    }
}

impl<T> Drop for PoolLease<T> {
    fn drop(&mut self) {
        self.replica.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A set of interchangeable replicas for one engine (OLTP or OLAP),
/// selected round-robin or by least-in-flight (spec §4.9). A single-element
/// group (the common case for this workspace) always picks that element.
pub struct PoolGroup<T> {
    replicas: Vec<Arc<TrackedReplica<T>>>,
    round_robin_cursor: AtomicUsize,
}

impl<T> PoolGroup<T> {
    pub fn new(replicas: Vec<Arc<T>>) -> Self {
        assert!(!replicas.is_empty(), "pool group requires at least one replica");
        Self {
            replicas: replicas
                .into_iter()
                .map(|inner| Arc::new(TrackedReplica { inner, in_flight: AtomicUsize::new(0) }))
                .collect(),
            round_robin_cursor: AtomicUsize::new(0),
        }
    }

    pub fn round_robin(&self) -> PoolLease<T> {
        let index = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % self.replicas.len();
        self.checkout(index)
    }

    pub fn least_in_flight(&self) -> PoolLease<T> {
        let index = self
            .replicas
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| r.in_flight.load(Ordering::SeqCst))
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.checkout(index)
    }

    fn checkout(&self, index: usize) -> PoolLease<T> {
        let replica = self.replicas[index].clone();
        replica.in_flight.fetch_add(1, Ordering::SeqCst);
        PoolLease { replica }
    }
}
