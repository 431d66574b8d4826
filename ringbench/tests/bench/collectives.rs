use super::helpers::run_cluster;
use ringbench::collective::gather_ordered;
use std::time::Duration;

#[tokio::test]
async fn test_barrier_small_and_large_worlds() {
    for world in [1, 2, 4, 5, 7] {
        run_cluster(world, |client| async move {
            for _ in 0..3 {
                client.barrier().await.unwrap();
            }
        })
        .await;
    }
}

/// A non-blocking barrier cannot finish while one rank has not entered,
/// and polling it never blocks.
#[tokio::test]
async fn test_barrier_nb_waits_for_late_rank() {
    run_cluster(3, |client| async move {
        if client.rank() == 0 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        let handle = client.barrier_nb();
        if client.rank() != 0 {
            assert!(!handle.is_finished());
        }
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.wait().await.unwrap();
    })
    .await;
}

/// Blocking and non-blocking barriers interleave without mixing epochs.
#[tokio::test]
async fn test_barrier_nb_then_blocking() {
    run_cluster(5, |client| async move {
        let h = client.barrier_nb();
        h.wait().await.unwrap();
        client.barrier().await.unwrap();
        client.barrier_nb().wait().await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_all_gather_rank_order() {
    let results = run_cluster(4, |client| async move {
        let block = [client.rank() as u8; 3];
        client.all_gather(&block).await.unwrap()
    })
    .await;
    let expected: Vec<u8> = (0..4u8).flat_map(|r| [r; 3]).collect();
    for r in results {
        assert_eq!(r, expected);
    }
}

#[tokio::test]
async fn test_gather_ordered_visits_ascending() {
    let results = run_cluster(4, |client| async move {
        let rank = client.rank();
        let data = vec![rank as u8; rank as usize + 1];
        let mut seen = Vec::new();
        let blocks = gather_ordered(&client, &data, 1, 42, |src, block| {
            assert_eq!(block.len(), src as usize + 1);
            seen.push(src);
            Ok(())
        })
        .await
        .unwrap();
        (seen, blocks)
    })
    .await;

    for (rank, (seen, blocks)) in results.iter().enumerate() {
        if rank == 1 {
            assert_eq!(seen, &vec![0, 1, 2, 3]);
            let blocks = blocks.as_ref().unwrap();
            assert_eq!(blocks[3], vec![3u8; 4]);
        } else {
            assert!(seen.is_empty());
            assert!(blocks.is_none());
        }
    }
}
