use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};

/// Outstanding-item counter plus the two capacity watermarks.
///
/// `load` is touched on every send and every dequeue without locking.
/// `capacity` and `pre_capacity` are only written while the queue set is
/// exclusively locked, but are readable at any time for the threshold probes.
pub(crate) struct LoadTracker {
    load: CachePadded<AtomicI64>,
    capacity: AtomicI64,
    pre_capacity: AtomicI64,
    shift: u32,
}

impl LoadTracker {
    pub(crate) fn new(capacity: i64, load_factor: u8) -> Self {
        Self {
            load: CachePadded::new(AtomicI64::new(0)),
            capacity: AtomicI64::new(capacity),
            pre_capacity: AtomicI64::new(0),
            shift: load_factor as u32,
        }
    }

    /// Counts an item once its queue slot is reserved, before the value is
    /// handed over, so a worker can never release it first.
    #[inline]
    pub(crate) fn acquire(&self) {
        self.load.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn release(&self) {
        self.load.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn load(&self) -> i64 {
        self.load.load(Ordering::Acquire).max(0)
    }

    #[inline]
    pub(crate) fn capacity(&self) -> i64 {
        self.capacity.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn pre_capacity(&self) -> i64 {
        self.pre_capacity.load(Ordering::Acquire)
    }

    /// Slack `capacity - load` has dropped under `capacity >> load_factor`.
    #[inline]
    pub(crate) fn grow_due(&self) -> bool {
        let capacity = self.capacity();
        capacity >> self.shift > capacity - self.load()
    }

    /// Slack against the pre-growth capacity is back above its threshold.
    #[inline]
    pub(crate) fn shrink_due(&self) -> bool {
        let pre = self.pre_capacity();
        pre != 0 && pre >> self.shift <= pre - self.load()
    }

    // caller must hold the queue set write lock
    pub(crate) fn record_growth(&self, capacity: i64) {
        self.pre_capacity.store(self.capacity(), Ordering::Release);
        self.capacity.store(capacity, Ordering::Release);
    }

    // caller must hold the queue set write lock
    pub(crate) fn record_shrink(&self, capacity: i64, next_pre_capacity: i64) {
        self.capacity.store(capacity, Ordering::Release);
        self.pre_capacity.store(next_pre_capacity, Ordering::Release);
    }

    // caller must hold the queue set write lock
    pub(crate) fn reset(&self) {
        self.capacity.store(0, Ordering::Release);
        self.pre_capacity.store(0, Ordering::Release);
    }
}
