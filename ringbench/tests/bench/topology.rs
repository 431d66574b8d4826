use super::helpers::run_cluster;
use ringbench::RingError;
use ringbench::topology::discover;

#[tokio::test]
async fn test_discover_local_ranks_and_unique_hosts() {
    let results = run_cluster(4, |client| async move {
        let host = ["beta", "alpha", "beta", "beta"][client.rank() as usize];
        discover(&client, host).await.unwrap()
    })
    .await;

    let expected_hosts = ["0:beta:0", "1:alpha:0", "2:beta:1", "3:beta:2"];
    for (rank, topo) in results.iter().enumerate() {
        let hosts: Vec<&str> = topo.hosts.iter().map(|h| h.as_str()).collect();
        assert_eq!(hosts, expected_hosts);
        let unique: Vec<&str> = topo.unique_hosts.iter().map(|h| h.as_str()).collect();
        assert_eq!(unique, ["alpha", "beta"]);
        assert_eq!(topo.local_rank, [0, 0, 1, 2][rank]);
        assert_eq!(topo.processes_per_node, [3, 1, 3, 3][rank]);
    }
}

#[tokio::test]
async fn test_discover_rejects_long_hostname() {
    let results = run_cluster(2, |client| async move {
        discover(&client, &"h".repeat(64)).await
    })
    .await;
    for r in results {
        assert!(matches!(r, Err(RingError::HostIdTooLong { .. })));
    }
}

/// The raw name fits but the decorated `rank:host:localrank` does not.
#[tokio::test]
async fn test_discover_rejects_long_decorated_host() {
    let results = run_cluster(2, |client| async move {
        discover(&client, &"h".repeat(60)).await
    })
    .await;
    for r in results {
        assert!(matches!(r, Err(RingError::HostIdTooLong { .. })));
    }
}

/// Only the highest rank's decorated string overflows (its rank prefix is
/// two digits); the others must fail too instead of waiting on it.
#[tokio::test]
async fn test_discover_fails_everywhere_when_one_rank_overflows() {
    let results = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        run_cluster(11, |client| async move {
            discover(&client, &"h".repeat(59)).await
        }),
    )
    .await
    .expect("discovery hung");

    for (rank, r) in results.into_iter().enumerate() {
        match r {
            Err(RingError::HostIdTooLong { value, len, max }) => {
                assert_eq!(max, 64);
                assert_eq!(len, 65);
                if rank == 10 {
                    assert!(value.starts_with("10:"));
                } else {
                    assert_eq!(value, "<rank 10>");
                }
            }
            other => panic!("rank {rank}: expected HostIdTooLong, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_discover_fails_everywhere_when_one_raw_name_is_too_long() {
    let results = run_cluster(3, |client| async move {
        let host = if client.rank() == 1 {
            "h".repeat(64)
        } else {
            "short".to_owned()
        };
        discover(&client, &host).await
    })
    .await;
    for r in results {
        assert!(matches!(r, Err(RingError::HostIdTooLong { len: 64, .. })));
    }
}
