//! Ring sweep over a 4-rank in-process cluster using the root gather.
//!
//! Every rank runs as a task on one runtime; rank 0 prints the report.
//!
//! ```bash
//! cargo run --example loopback_sweep
//! ```

use ringbench::{AggregationStrategy, BenchConfig, RingClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> ringbench::Result<()> {
    let config = BenchConfig {
        bufcnt: 64 * 1024,
        nrep: 5,
        aggregation: AggregationStrategy::Root,
        ..BenchConfig::default()
    };

    let clients: Vec<Arc<RingClient>> = RingClient::bootstrap_local(4)
        .await?
        .into_iter()
        .map(Arc::new)
        .collect();

    let mut handles = Vec::new();
    for c in &clients {
        let c = Arc::clone(c);
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            ringbench::run_benchmark(&c, &config, "loopback").await
        }));
    }
    for h in handles {
        let outcome = h.await.expect("benchmark task panicked")?;
        if let Some(report) = outcome.report {
            print!("{report}");
        }
    }
    Ok(())
}
