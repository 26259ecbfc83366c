use std::time::Duration;

use tokio::time::Instant;

#[test_timeout::tokio_timeout_test(paused)]
async fn paused_tests_outlive_the_timeout_in_virtual_time() {
    let start = Instant::now();
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(start.elapsed() >= Duration::from_secs(3600));
}

#[test_timeout::tokio_timeout_test(paused, 5)]
async fn paused_with_explicit_timeout() {
    tokio::time::sleep(Duration::from_secs(120)).await;
}

#[test_timeout::tokio_timeout_test]
async fn real_clock_runs_to_completion() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[test_timeout::timeout]
fn synchronous_body_runs() {
    assert_eq!(2 + 2, 4);
}
