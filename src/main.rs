use fanout_pool::{DispatchPoolInner, StopPolicy};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};
use tokio::runtime::Builder;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let rt = Builder::new_multi_thread()
        .worker_threads(8)
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let now = Instant::now();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let pool = DispatchPoolInner::new(move |_: u64| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        pool.start_recv().unwrap();

        for i in 0..1_000_000u64 {
            pool.send(i, true).await.unwrap();
        }
        let metrics = pool.metrics();
        let summary = pool.stop_recv(StopPolicy::Drain).await.unwrap();

        println!(
            "processed {} items in {:?}, grown {} times, shrunk {} times, {} workers at stop",
            seen.load(Ordering::Relaxed),
            now.elapsed(),
            metrics.grown,
            metrics.shrunk,
            summary.workers,
        );
    });
}
