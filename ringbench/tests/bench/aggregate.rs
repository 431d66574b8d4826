use super::helpers::{run_cluster, small_config};
use ringbench::bench::{CollectiveGather, RootGather, TimingAggregator, run_sweep};
use ringbench::{AggregationStrategy, ReduceOp};
use std::time::Duration;

/// Every rank ends up with the same matrix, and the global maximum bounds
/// every local maximum.
#[tokio::test]
async fn test_collective_gather_everywhere() {
    let cfg = small_config();
    let results = run_cluster(4, move |client| {
        let cfg = cfg.clone();
        async move {
            let timings = run_sweep(&client, &cfg).await.unwrap();
            let report = CollectiveGather
                .aggregate(&client, &timings)
                .await
                .unwrap()
                .unwrap();
            (timings, report)
        }
    })
    .await;

    let first = &results[0].1;
    assert_eq!(first.strategy, AggregationStrategy::Collective);
    assert!(first.matrix.is_complete());
    for (rank, (timings, report)) in results.iter().enumerate() {
        assert_eq!(report.matrix, first.matrix, "rank {rank}");
        assert!(report.extremes.t_max >= timings.local_max());
        assert!(report.extremes.t_min <= timings.local_min());
        for sender in 0..4 {
            let t = report.matrix.receive_time(rank as u32, sender).unwrap();
            assert_eq!(t, timings.averaged_row()[sender as usize]);
        }
    }
}

/// Only root builds the matrix, and row `j` is exactly what rank `j`
/// measured. Rows are sent in descending rank order; root still takes them
/// in ascending order (an out-of-order row would fail `push_row`).
#[tokio::test]
async fn test_root_gather_in_rank_order() {
    let cfg = small_config();
    let root = 2;
    let results = run_cluster(4, move |client| {
        let cfg = cfg.clone();
        async move {
            let timings = run_sweep(&client, &cfg).await.unwrap();
            let rank = client.rank();
            if rank != root {
                let delay = 60 * u64::from(4 - rank);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let report = RootGather { root }
                .aggregate(&client, &timings)
                .await
                .unwrap();
            (timings, report)
        }
    })
    .await;

    for (rank, (_, report)) in results.iter().enumerate() {
        assert_eq!(report.is_some(), rank as u32 == root, "rank {rank}");
    }
    let report = results[root as usize].1.as_ref().unwrap();
    assert_eq!(report.strategy, AggregationStrategy::Root);
    assert!(report.matrix.is_complete());
    // Root had to wait for rank 0, the last to send.
    assert!(report.gather_elapsed >= 0.1, "{}", report.gather_elapsed);
    for (rank, (timings, _)) in results.iter().enumerate() {
        let row: Vec<f64> = (0..4)
            .map(|s| report.matrix.receive_time(rank as u32, s).unwrap())
            .collect();
        assert_eq!(row, timings.averaged_row());
        assert!(report.extremes.t_max >= timings.local_max());
    }
}

/// Every entry is a positive time no larger than the slowest repetition
/// seen on any rank.
#[tokio::test]
async fn test_loopback_matrix_entries_sane() {
    let cfg = small_config();
    let results = run_cluster(3, move |client| {
        let cfg = cfg.clone();
        async move {
            let timings = run_sweep(&client, &cfg).await.unwrap();
            CollectiveGather
                .aggregate(&client, &timings)
                .await
                .unwrap()
                .unwrap()
        }
    })
    .await;
    let report = &results[0];
    let t_max = report.extremes.t_max;
    assert!(t_max.is_finite() && t_max > 0.0);
    let entries: Vec<f64> = (0..3).flat_map(|s| report.matrix.sender_row(s)).collect();
    for &t in &entries {
        assert!(t.is_finite() && t > 0.0, "entry {t}");
        // Each entry averages receive times that each fit in one repetition.
        assert!(t <= t_max * (1.0 + 1e-12), "entry {t} above t_max {t_max}");
    }
    assert!(report.gather_elapsed >= 0.0);
}

#[tokio::test]
async fn test_all_reduce_extremes() {
    let results = run_cluster(4, |client| async move {
        let v = client.rank() as f64 + 0.5;
        (
            client.all_reduce_f64(v, ReduceOp::Max).await.unwrap(),
            client.all_reduce_f64(v, ReduceOp::Min).await.unwrap(),
            client.all_reduce_f64(v, ReduceOp::Sum).await.unwrap(),
        )
    })
    .await;
    for r in results {
        assert_eq!(r, (3.5, 0.5, 8.0));
    }
}
