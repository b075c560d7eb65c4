#[cfg(test)]
mod tests {
    use fanout_pool::{
        errors::SendError,
        model::StopPolicy,
        pool::{Config, DispatchPoolInner},
        selector::HashSelector,
    };
    use std::{
        collections::HashMap,
        future::Future,
        hash::{Hash, Hasher},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::{Duration, Instant},
    };

    async fn measure<F, Fut, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();
        println!("✓ {}: {:?}", name, elapsed);
        result
    }

    async fn eventually<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cond()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_1_burst_grows_and_shrinks() {
        println!("\n=== LOAD TEST 1: burst against slow callbacks ===");
        let config = Config {
            queue_len: 8,
            queue_count: 2,
            step: 2,
            load_factor: 1,
            ..Default::default()
        };
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let pool = DispatchPoolInner::with_config(config, move |_: u32| {
            std::thread::sleep(Duration::from_millis(1));
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        pool.start_recv().unwrap();

        measure("4 producers x 50 blocking sends", || async {
            let producers: Vec<_> = (0..4)
                .map(|_| {
                    let pool = pool.clone();
                    tokio::spawn(async move {
                        for i in 0..50 {
                            pool.send(i, true).await.unwrap();
                        }
                    })
                })
                .collect();
            for p in futures::future::join_all(producers).await {
                p.unwrap();
            }
        })
        .await;

        assert!(eventually(Duration::from_secs(10), || seen.load(Ordering::Relaxed) == 200).await);
        assert!(eventually(Duration::from_secs(1), || pool.metrics().processed == 200).await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let metrics = pool.metrics();
        println!("  grown: {}, shrunk: {}, queues: {}", metrics.grown, metrics.shrunk, metrics.queues);
        assert!(metrics.grown >= 1);
        assert!(metrics.shrunk >= 1);
        assert!(metrics.queues >= 2);
        assert_eq!(metrics.queues, 2 + 2 * (metrics.grown - metrics.shrunk));
        assert_eq!(metrics.capacity, metrics.queues as i64 * 8);
        assert_eq!(metrics.load, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_2_non_blocking_with_retry() {
        println!("\n=== LOAD TEST 2: non-blocking producers retrying ===");
        let config = Config {
            queue_len: 16,
            ..Default::default()
        };
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let pool = DispatchPoolInner::with_config(config, move |_: u64| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        pool.start_recv().unwrap();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    for i in 0..1_000u64 {
                        let mut value = p * 1_000 + i;
                        loop {
                            match pool.try_send(value) {
                                Ok(()) => break,
                                Err(SendError::Block(v)) => {
                                    value = v;
                                    tokio::task::yield_now().await;
                                }
                                Err(e) => panic!("unexpected {:?}", e),
                            }
                        }
                    }
                })
            })
            .collect();
        for p in futures::future::join_all(producers).await {
            p.unwrap();
        }

        assert!(eventually(Duration::from_secs(10), || seen.load(Ordering::Relaxed) == 4_000).await);
        assert!(eventually(Duration::from_secs(1), || pool.metrics().processed == 4_000).await);
        let metrics = pool.metrics();
        println!("  rejected: {}, grown: {}", metrics.rejected, metrics.grown);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_3_throughput() {
        println!("\n=== LOAD TEST 3: 100k items, default config ===");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let pool = DispatchPoolInner::new(move |_: u32| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        pool.start_recv().unwrap();

        let summary = measure("100k sends + drain", || async {
            for i in 0..100_000 {
                pool.send(i, true).await.unwrap();
            }
            pool.stop_recv(StopPolicy::Drain).await.unwrap()
        })
        .await;

        assert_eq!(seen.load(Ordering::Relaxed), 100_000);
        assert_eq!(summary.abandoned, 0);
        println!("  grown: {}, shrunk: {}", pool.metrics().grown, pool.metrics().shrunk);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_4_dropping_pool_drains() {
        println!("\n=== LOAD TEST 4: dropped pool still drains its queues ===");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let pool = DispatchPoolInner::new(move |_: u32| {
            std::thread::sleep(Duration::from_micros(100));
            counter.fetch_add(1, Ordering::Relaxed);
        });
        pool.start_recv().unwrap();

        for i in 0..500 {
            pool.send(i, true).await.unwrap();
        }
        drop(pool);

        assert!(eventually(Duration::from_secs(5), || seen.load(Ordering::Relaxed) == 500).await);
    }

    struct Keyed {
        key: u32,
        seq: u32,
    }

    // routes by key only
    impl Hash for Keyed {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.key.hash(state);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_5_key_affinity_keeps_order() {
        println!("\n=== LOAD TEST 5: per-key FIFO with HashSelector ===");
        let config = Config {
            queue_len: 4,
            queue_count: 4,
            step: 2,
            load_factor: 1,
            ..Default::default()
        }
        .with_selector(HashSelector::new(4));

        let seen: Arc<Mutex<HashMap<u32, Vec<u32>>>> = Arc::new(Mutex::new(HashMap::new()));
        let sink = seen.clone();
        let pool = DispatchPoolInner::with_config(config, move |item: Keyed| {
            sink.lock().unwrap().entry(item.key).or_default().push(item.seq);
        })
        .unwrap();
        pool.start_recv().unwrap();

        for seq in 0..200 {
            for key in 0..8 {
                pool.send(Keyed { key, seq }, true).await.unwrap();
            }
        }

        assert!(
            eventually(Duration::from_secs(5), || {
                seen.lock().unwrap().values().map(Vec::len).sum::<usize>() == 1_600
            })
            .await
        );

        let seen = seen.lock().unwrap();
        for (key, seqs) in seen.iter() {
            assert!(seqs.windows(2).all(|w| w[0] < w[1]), "key {} out of order", key);
        }
    }
}
