use super::helpers::{run_cluster, small_config};
use ringbench::bench::run_sweep;

async fn sweep_counts(world: u32) {
    let cfg = small_config();
    let nrep = cfg.nrep;
    let results = run_cluster(world, move |client| {
        let cfg = cfg.clone();
        async move { run_sweep(&client, &cfg).await.unwrap() }
    })
    .await;

    for (rank, t) in results.iter().enumerate() {
        assert_eq!(t.distances().len(), world as usize);
        assert_eq!(
            t.attribution_counts(),
            vec![2 * nrep; world as usize].as_slice(),
            "rank {rank}"
        );
        for avg in t.averaged_row() {
            assert!(avg >= 0.0);
            assert!(avg <= t.local_max() + 1e-12, "rank {rank}: {avg} > {}", t.local_max());
        }
        for (d, s) in t.distances().iter().enumerate() {
            assert_eq!(s.pair.distance as usize, d);
            assert!(s.avg_elapsed >= t.local_min() - 1e-12);
            assert!(s.avg_elapsed <= t.local_max() + 1e-12);
        }
    }
}

#[tokio::test]
async fn test_sweep_single_rank() {
    sweep_counts(1).await;
}

#[tokio::test]
async fn test_sweep_three_ranks() {
    sweep_counts(3).await;
}

#[tokio::test]
async fn test_sweep_four_ranks() {
    sweep_counts(4).await;
}

/// Five ranks run the dissemination barrier between distances.
#[tokio::test]
async fn test_sweep_five_ranks() {
    sweep_counts(5).await;
}

/// Four ranks with rank 0 partnering (1,3), (2,2), (3,1) after the
/// loopback distance.
#[tokio::test]
async fn test_sweep_partners_rank_zero() {
    let cfg = small_config();
    let results = run_cluster(4, move |client| {
        let cfg = cfg.clone();
        async move { run_sweep(&client, &cfg).await.unwrap() }
    })
    .await;
    let pairs: Vec<(u32, u32)> = results[0]
        .distances()
        .iter()
        .map(|s| (s.pair.up, s.pair.down))
        .collect();
    assert_eq!(pairs, vec![(0, 0), (1, 3), (2, 2), (3, 1)]);
}
