use super::helpers::run_cluster;
use ringbench::bench::{ElementType, RingPair, RoundBuffers, SweepTimings, TransferBuffer, TransferRound};
use ringbench::{RingError, wait_any};
use std::sync::Arc;

/// wait_any hands back the request that completed together with the rank
/// the message actually came from.
#[tokio::test]
async fn test_wait_any_reports_actual_source() {
    run_cluster(3, |client| async move {
        let rank = client.rank();
        if rank == 0 {
            let reqs = vec![
                client.irecv(1, 5, vec![0u8; 4]).unwrap(),
                client.irecv(2, 5, vec![0u8; 4]).unwrap(),
            ];
            let sources: Vec<u32> = reqs.iter().map(|r| r.source()).collect();
            let (idx, first, mut rest) = wait_any(reqs).await.unwrap();
            assert_eq!(first.source, sources[idx]);
            assert_eq!(first.buf, vec![first.source as u8; 4]);

            let second = rest.pop().unwrap().await.unwrap();
            assert_ne!(second.source, first.source);
            assert_eq!(second.buf, vec![second.source as u8; 4]);
            assert!(wait_any(Vec::new()).await.is_err());
        } else {
            let payload: Arc<[u8]> = vec![rank as u8; 4].into();
            client.isend(0, 5, payload).unwrap().wait().await.unwrap();
        }
    })
    .await;
}

/// A single rank exchanges with itself at distance 0 through the same
/// code path as a remote exchange.
#[tokio::test]
async fn test_loopback_round_on_single_rank() {
    let results = run_cluster(1, |client| async move {
        let pair = RingPair::compute(1, 0, 0).unwrap();
        assert!(pair.is_self_pair(0));
        let mut buffers = RoundBuffers::new(TransferBuffer::for_rank(0, ElementType::U32, 64));
        let mut timings = SweepTimings::new(1, 4);
        TransferRound::new(&client, pair)
            .run(4, &mut buffers, &mut timings)
            .await
            .unwrap();
        timings
    })
    .await;
    assert_eq!(results[0].attribution_counts(), &[8]);
    assert!(results[0].local_max() >= results[0].local_min());
}

/// With two ranks, distance 1 has the same neighbor up and down; both
/// receives are charged to it.
#[tokio::test]
async fn test_two_ranks_same_neighbor_both_ways() {
    let results = run_cluster(2, |client| async move {
        let rank = client.rank();
        let pair = RingPair::compute(2, rank, 1).unwrap();
        assert_eq!(pair.up, pair.down);
        let mut buffers = RoundBuffers::new(TransferBuffer::for_rank(rank, ElementType::U8, 300));
        let mut timings = SweepTimings::new(2, 5);
        TransferRound::new(&client, pair)
            .run(5, &mut buffers, &mut timings)
            .await
            .unwrap();
        timings
    })
    .await;
    assert_eq!(results[0].attribution_counts(), &[0, 10]);
    assert_eq!(results[1].attribution_counts(), &[10, 0]);
}

/// A sender whose payload does not follow its own pattern is caught by the
/// receiver, naming sender, receiver, position and values.
#[tokio::test]
async fn test_payload_mismatch_is_fatal() {
    let results = run_cluster(2, |client| async move {
        let rank = client.rank();
        // Rank 1 fills its buffer with rank 7's pattern.
        let pattern_rank = if rank == 1 { 7 } else { rank };
        let pair = RingPair::compute(2, rank, 1).unwrap();
        let mut buffers =
            RoundBuffers::new(TransferBuffer::for_rank(pattern_rank, ElementType::U32, 16));
        let mut timings = SweepTimings::new(2, 1);
        TransferRound::new(&client, pair)
            .run(1, &mut buffers, &mut timings)
            .await
    })
    .await;

    assert!(results[1].is_ok());
    match &results[0] {
        Err(RingError::PayloadMismatch {
            sender,
            receiver,
            distance,
            repetition,
            position,
            expected,
            actual,
        }) => {
            assert_eq!((*sender, *receiver, *distance), (1, 0, 1));
            assert_eq!(*repetition, 0);
            assert_eq!(*position, 0);
            assert_eq!(*expected, 1);
            assert_eq!(*actual, 7);
        }
        other => panic!("expected payload mismatch, got {other:?}"),
    }
}
