use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Routing policy: picks the queue a value goes to.
///
/// `queues` is the live queue count at the time of the call. Implementations
/// may return any index; the pool reduces it modulo `queues`.
pub trait Selector<T: ?Sized>: Send + Sync {
    fn select(&self, value: &T, queues: usize) -> usize;
}

impl<T, F> Selector<T> for F
where
    T: ?Sized,
    F: Fn(&T, usize) -> usize + Send + Sync,
{
    #[inline]
    fn select(&self, value: &T, queues: usize) -> usize {
        self(value, queues)
    }
}

/// Default policy. Cycles over every live queue, including those added by growth.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: ?Sized> Selector<T> for RoundRobin {
    #[inline]
    fn select(&self, _value: &T, queues: usize) -> usize {
        if queues == 0 {
            return 0;
        }
        self.next.fetch_add(1, Ordering::Relaxed) % queues
    }
}

/// Key affinity over the base queues only.
///
/// Equal values always land on the same queue, so per-key FIFO holds across
/// growth and shrink. Grown queues are never targeted by this policy.
#[derive(Debug, Clone, Copy)]
pub struct HashSelector {
    base: usize,
}

impl HashSelector {
    pub fn new(base: usize) -> Self {
        Self { base: base.max(1) }
    }
}

impl<T: Hash + ?Sized> Selector<T> for HashSelector {
    fn select(&self, value: &T, queues: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        let scope = self.base.min(queues).max(1);
        (hasher.finish() % scope as u64) as usize
    }
}
