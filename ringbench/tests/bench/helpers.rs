use ringbench::{BenchConfig, RingClient};
use std::sync::Arc;

/// Run `f` on every rank of an in-process cluster and collect the results
/// in rank order. Keeps all clients alive until every task completes.
pub async fn run_cluster<F, Fut, T>(world_size: u32, f: F) -> Vec<T>
where
    F: Fn(Arc<RingClient>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let clients: Vec<Arc<RingClient>> = RingClient::bootstrap_local(world_size)
        .await
        .unwrap()
        .into_iter()
        .map(Arc::new)
        .collect();

    let f = Arc::new(f);
    let mut handles = Vec::new();
    for c in &clients {
        let c = Arc::clone(c);
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(c).await }));
    }
    let mut out = Vec::with_capacity(handles.len());
    for h in handles {
        out.push(h.await.unwrap());
    }
    out
}

/// A configuration small enough for loopback tests.
pub fn small_config() -> BenchConfig {
    BenchConfig {
        bufcnt: 1024,
        nrep: 3,
        ..BenchConfig::default()
    }
}
