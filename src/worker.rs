use super::pool::DispatchPoolInner;
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Live worker count with a wakeup for "everyone has exited".
#[derive(Default)]
pub(crate) struct WorkerGauge {
    live: AtomicUsize,
    idle: Notify,
}

impl WorkerGauge {
    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn enter(self: &Arc<Self>) -> WorkerGuard {
        self.live.fetch_add(1, Ordering::AcqRel);
        WorkerGuard(self.clone())
    }

    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.live() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the gauge when the worker exits, however it exits.
pub(crate) struct WorkerGuard(Arc<WorkerGauge>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if self.0.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Drains one queue until it is closed or receiving is cancelled.
pub(crate) struct Worker<T> {
    pub(crate) id: usize,
    pub(crate) rx: mpsc::Receiver<T>,
    pub(crate) pool: Weak<DispatchPoolInner<T>>,
    pub(crate) callback: Callback<T>,
    pub(crate) cancel: CancellationToken,
    pub(crate) guard: WorkerGuard,
}

impl<T: Send + 'static> Worker<T> {
    pub(crate) async fn run(mut self) {
        tracing::trace!(worker = self.id, "worker started");
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                v = self.rx.recv() => Some(v),
            };
            let value = match next {
                Some(Some(v)) => v,
                Some(None) => break,
                None => {
                    self.abandon();
                    break;
                }
            };

            let pool = self.pool.upgrade();
            if let Some(pool) = &pool {
                pool.tracker.release();
            }

            let ok = catch_unwind(AssertUnwindSafe(|| (self.callback)(value))).is_ok();

            if let Some(pool) = pool {
                pool.record_processed(ok, self.id);
                pool.shrink();
            }
        }
        tracing::trace!(worker = self.id, "worker exited");
        drop(self.guard);
    }

    fn abandon(&mut self) {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            if let Some(pool) = self.pool.upgrade() {
                pool.record_abandoned(dropped);
            }
            tracing::warn!(worker = self.id, dropped, "abandoned buffered items");
        }
    }
}
