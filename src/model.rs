/// Point-in-time snapshot of the pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub queues: usize,
    pub capacity: i64,
    pub pre_capacity: i64,
    pub load: i64,
    pub live_workers: usize,
    pub processed: usize,
    pub panicked: usize,
    pub rejected: usize,
    pub abandoned: usize,
    pub grown: usize,
    pub shrunk: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.load as f64 / self.capacity as f64
    }

    pub fn slack(&self) -> i64 {
        self.capacity - self.load
    }
}

/// Receive lifecycle. Moves forward only: `Stopped -> Started -> Terminated`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    Stopped = 0,
    Started = 1,
    Terminated = 2,
}

impl RecvStatus {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => RecvStatus::Stopped,
            1 => RecvStatus::Started,
            _ => RecvStatus::Terminated,
        }
    }
}

/// What workers do with items still buffered when receiving stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    /// Process every buffered item before exiting.
    #[default]
    Drain,
    /// Exit at the next item boundary and discard what is left.
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopSummary {
    pub workers: usize,
    pub abandoned: usize,
}
