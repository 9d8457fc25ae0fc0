//! Load testing for tool calls through the server.

use std::time::{Duration, Instant};

use serde_json::json;

mod common;
use common::{start_server, test_config, TEST_TOKEN};

#[tokio::test]
async fn test_load_performance() {
    let upstream = common::start_mock_backend(r#"{"search_results":[]}"#).await;

    let mut config = test_config(upstream);
    config.upstream.api_key = Some("server-key".to_string());
    config.server.auth_required = false;
    config.rate_limit.enabled = false;
    config.pool.max_connections = 16;
    config.pool.max_per_host = 16;
    let server = start_server(config).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = server.url("/tools/search_vectara");
        tasks.push(tokio::spawn(async move {
            let mut latencies: Vec<Duration> = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client
                    .post(&url)
                    .header("authorization", format!("Bearer {}", TEST_TOKEN))
                    .json(&json!({"query": "load", "corpus_keys": ["docs"]}))
                    .send()
                    .await;
                if let Ok(res) = res {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    let stats = server.manager.stats();
    assert_eq!(stats.connection_pool.available_permits, 16);
    assert_eq!(stats.circuit_breaker.failure_count, 0);
    assert_eq!(server.manager.retry_metrics().stats().total_successes, total_requests as u64);

    server.shutdown.trigger();
}
