use super::helpers::{run_cluster, small_config};
use ringbench::{AggregationStrategy, BenchConfig, RingError, run_benchmark};

#[tokio::test]
async fn test_report_only_on_root() {
    let cfg = small_config();
    let results = run_cluster(3, move |client| {
        let cfg = cfg.clone();
        async move { run_benchmark(&client, &cfg, "node").await.unwrap() }
    })
    .await;

    assert!(results[1].report.is_none());
    assert!(results[2].report.is_none());
    let report = results[0].report.as_ref().unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.first(), Some(&"# --> BEGIN execution"));
    assert_eq!(lines.last(), Some(&"# --> END execution"));
    assert!(lines.contains(&"# nranks = 3"));
    assert!(lines.contains(&"0:node:0, 1:node:1, 2:node:2"));
    assert!(lines.contains(&"# unique hosts (1): node "));
    assert!(lines.contains(&"# bufsize = 4096 (bytes)"));
    assert!(lines.contains(&"# aggregation = collective"));
    let distance_lines = lines
        .iter()
        .filter(|l| l.starts_with("#     0,"))
        .count();
    assert_eq!(distance_lines, 3);
    let rows = lines.iter().filter(|l| l.starts_with("1:node:1, ")).count();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_root_strategy_reports_on_configured_root() {
    let cfg = BenchConfig {
        aggregation: AggregationStrategy::Root,
        root: 1,
        itemsize: 8,
        ..small_config()
    };
    let results = run_cluster(2, move |client| {
        let cfg = cfg.clone();
        async move { run_benchmark(&client, &cfg, "node").await.unwrap() }
    })
    .await;

    assert!(results[0].report.is_none());
    assert!(results[0].sweep.is_none());
    let report = results[1].report.as_ref().unwrap();
    assert!(report.contains("# aggregation = root"));
    assert!(report.contains("# gather (root) on 2 ranks required"));
    assert!(report.lines().any(|l| l.starts_with("#     1,")));
}

#[tokio::test]
async fn test_invalid_config_fails_everywhere() {
    let cfg = BenchConfig {
        itemsize: 3,
        ..small_config()
    };
    let results = run_cluster(2, move |client| {
        let cfg = cfg.clone();
        async move { run_benchmark(&client, &cfg, "node").await }
    })
    .await;
    for r in results {
        assert!(matches!(r, Err(RingError::Config(_))));
    }
}
