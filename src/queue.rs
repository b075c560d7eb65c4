use tokio::{runtime::Handle, sync::mpsc};

/// One bounded queue. The receiver waits here until a worker is spawned for it.
pub(crate) struct Slot<T> {
    tx: mpsc::Sender<T>,
    pending: Option<mpsc::Receiver<T>>,
}

impl<T> Slot<T> {
    fn new(queue_len: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_len);
        Self {
            tx,
            pending: Some(rx),
        }
    }
}

/// Ordered set of bounded queues. Grows by appending, shrinks from the tail.
pub(crate) struct QueueSet<T> {
    slots: Vec<Slot<T>>,
    queue_len: usize,
    base: usize,
    /// Present while receiving: new queues get a worker spawned on it immediately.
    pub(crate) runtime: Option<Handle>,
}

impl<T> QueueSet<T> {
    pub(crate) fn new(base: usize, queue_len: usize) -> Self {
        Self {
            slots: (0..base).map(|_| Slot::new(queue_len)).collect(),
            queue_len,
            base,
            runtime: None,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub(crate) fn sender(&self, index: usize) -> &mpsc::Sender<T> {
        &self.slots[index % self.slots.len()].tx
    }

    pub(crate) fn capacity(&self) -> i64 {
        (self.slots.len() * self.queue_len) as i64
    }

    pub(crate) fn append(&mut self, step: usize) {
        let queue_len = self.queue_len;
        self.slots.extend((0..step).map(|_| Slot::new(queue_len)));
    }

    /// Removes the trailing `step` queues, never going below the base count.
    /// Dropping the returned slots closes those queues.
    pub(crate) fn truncate(&mut self, step: usize) -> Vec<Slot<T>> {
        if self.slots.len() < self.base + step {
            return Vec::new();
        }
        let at = self.slots.len() - step;
        self.slots.split_off(at)
    }

    /// Capacity one shrink step below the current size, or 0 at the base.
    pub(crate) fn next_pre_capacity(&self, step: usize) -> i64 {
        match self.slots.len().checked_sub(step) {
            Some(n) if n >= self.base => (n * self.queue_len) as i64,
            _ => 0,
        }
    }

    /// Receivers of queues that do not have a worker yet.
    pub(crate) fn take_pending(&mut self) -> Vec<mpsc::Receiver<T>> {
        self.slots.iter_mut().filter_map(|s| s.pending.take()).collect()
    }

    pub(crate) fn close_all(&mut self) -> Vec<Slot<T>> {
        self.runtime = None;
        std::mem::take(&mut self.slots)
    }
}
