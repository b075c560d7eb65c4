//! Elastic fan-out dispatch pool on tokio
//!
//! # Features
//! - Bounded queues with one worker task each
//! - Pluggable routing (round-robin, key hash, closures)
//! - Grows under sustained load, shrinks back once it subsides
//! - Blocking and non-blocking submission
//! - Drain or abandon on stop
//! - Metrics snapshot

pub mod errors;
pub mod model;
pub mod pool;
pub mod selector;

mod load;
mod queue;
mod worker;

pub use errors::{PoolError, SendError};
pub use model::{PoolMetrics, RecvStatus, StopPolicy, StopSummary};
pub use pool::{Builder, Config, DispatchPool, DispatchPoolInner};
pub use selector::{HashSelector, RoundRobin, Selector};
