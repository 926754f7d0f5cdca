use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Idle, teardown, close
// ══════════════════════════════════════════════════════════════════════════════

/// No ticks fire while there is nothing to send.
#[tokio::test(start_paused = true)]
async fn test_idle_channel_does_not_poll() {
    let channel = open_channel(&config(2, 1.0));
    channel.enqueue_all(&["a", "b", "c"]).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3600)).await;
    let stats = channel.stats().await;
    assert_eq!(stats.sent, 3);
    assert!(stats.ticks >= 3);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(channel.stats().await.ticks, stats.ticks);
    channel.finish().await;
}

/// Shutdown disarms the timer and discards the backlog.
#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_backlog() {
    let channel = open_channel(&config(2, 10.0));
    channel
        .enqueue_all(&["a", "b", "c", "d", "e"])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;

    let (sent, stats) = channel.shut_down().await;
    assert_eq!(commands(&sent), vec!["a", "b", "c"]);
    assert_eq!(stats.sent, 3);
    assert_eq!(stats.queued, 0);
}

/// Dropping every handle drains the backlog at the throttled rate.
#[tokio::test(start_paused = true)]
async fn test_closing_handles_drains_backlog() {
    let channel = open_channel(&config(1, 2.0));
    let start = channel.start;
    channel.enqueue_all(&["a", "b", "c"]).await.unwrap();

    let (sent, stats) = channel.finish().await;
    assert_eq!(commands(&sent), vec!["a", "b", "c"]);
    assert_eq!(stats.queued, 0);
    assert!(start.elapsed() >= Duration::from_secs(4));
}

// ══════════════════════════════════════════════════════════════════════════════
//  Send failures
// ══════════════════════════════════════════════════════════════════════════════

/// A refused command is consumed and reported; later commands still go out
/// and the failure does not refund its permit.
#[tokio::test(start_paused = true)]
async fn test_send_failure_is_reported_not_retried() {
    let mut channel = open_channel(&config(1, 1.0));
    channel
        .enqueue_all(&["first", "!refused", "third"])
        .await
        .unwrap();

    let failure = channel.failures.recv().await.unwrap();
    assert_eq!(failure.payload, "!refused");
    assert!(matches!(failure.error, SendError::Rejected(_)));

    let (sent, stats) = channel.finish().await;
    assert_eq!(commands(&sent), vec!["first", "third"]);
    assert_near(sent[1].at, Duration::from_secs(2));
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.send_failures, 1);
}

// ══════════════════════════════════════════════════════════════════════════════
//  Configuration
// ══════════════════════════════════════════════════════════════════════════════

/// A channel opened from a TOML document honors its bucket settings.
#[tokio::test(start_paused = true)]
async fn test_channel_from_toml_config() {
    let config = FloodgateConfig::from_toml_str(
        r#"
        [bucket]
        capacity = 1
        refill_interval_secs = 0.25

        [queue]
        max_depth = 10
        overflow = "reject"
        "#,
    )
    .unwrap();
    let channel = open_channel(&config);
    channel.enqueue_all(&["a", "b", "c"]).await.unwrap();

    let (sent, _) = channel.finish().await;
    assert_near(sent[0].at, Duration::ZERO);
    assert_near(sent[1].at, Duration::from_millis(250));
    assert_near(sent[2].at, Duration::from_millis(500));
}

/// Reconfiguring mid-backlog starts a fresh full bucket.
#[tokio::test(start_paused = true)]
async fn test_reconfigure_mid_backlog() {
    let channel = open_channel(&config(1, 60.0));
    channel.enqueue_all(&["a", "b", "c", "d"]).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(channel.stats().await.sent, 1);

    channel
        .handle
        .reconfigure(BucketConfig {
            capacity: 2,
            refill_interval_secs: 1.0,
        })
        .await
        .unwrap();

    let (sent, _) = channel.finish().await;
    assert_eq!(commands(&sent), vec!["a", "b", "c", "d"]);
    assert_near(sent[1].at, Duration::from_secs(5));
    assert_near(sent[2].at, Duration::from_secs(5));
    assert_near(sent[3].at, Duration::from_secs(6));
}
