use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Rate shaping
// ══════════════════════════════════════════════════════════════════════════════

/// capacity 2, one permit per second. A, B, C at t=0 and D at t=0.5 go out
/// as A, B at 0, C at 1, D at 2.
#[tokio::test(start_paused = true)]
async fn test_burst_then_refill_schedule() {
    let channel = open_channel(&config(2, 1.0));
    channel.enqueue_all(&["A", "B", "C"]).await.unwrap();

    tokio::time::sleep_until(channel.start + Duration::from_millis(500)).await;
    channel.enqueue_all(&["D"]).await.unwrap();

    let (sent, stats) = channel.finish().await;
    assert_eq!(commands(&sent), vec!["A", "B", "C", "D"]);
    assert_near(sent[0].at, Duration::ZERO);
    assert_near(sent[1].at, Duration::ZERO);
    assert_near(sent[2].at, Duration::from_secs(1));
    assert_near(sent[3].at, Duration::from_secs(2));
    assert_eq!(stats.sent, 4);
}

/// A full bucket lets exactly `capacity` commands out before any refill.
#[tokio::test(start_paused = true)]
async fn test_burst_bounded_by_capacity() {
    let channel = open_channel(&config(5, 1.0));
    let backlog: Vec<String> = (0..20).map(|i| format!("PRIVMSG #tor :{i}")).collect();
    for cmd in &backlog {
        channel.handle.enqueue(cmd.clone()).await.unwrap();
    }

    tokio::time::sleep_until(channel.start + Duration::from_millis(999)).await;
    assert_eq!(channel.stats().await.sent, 5);

    let (sent, _) = channel.finish().await;
    assert_eq!(sent.len(), 20);
    let before_refill = sent
        .iter()
        .filter(|s| s.at < Duration::from_secs(1))
        .count();
    assert_eq!(before_refill, 5);
}

/// Once the burst is spent, sends are spaced by at least the refill interval.
#[tokio::test(start_paused = true)]
async fn test_steady_state_spacing() {
    let refill = Duration::from_millis(1500);
    let channel = open_channel(&config(3, 1.5));
    let backlog: Vec<String> = (0..12).map(|i| format!("MODE #tor +v user{i}")).collect();
    for cmd in &backlog {
        channel.handle.enqueue(cmd.clone()).await.unwrap();
    }

    let (sent, stats) = channel.finish().await;
    assert_eq!(sent.len(), 12);
    assert_eq!(stats.sent, 12);
    for pair in sent[2..].windows(2) {
        let gap = pair[1].at - pair[0].at;
        assert!(gap >= refill, "{} -> {} only {gap:?} apart", pair[0].command, pair[1].command);
    }
    // Nine refills after the burst of three.
    assert_near(sent[11].at, refill * 9);
}

/// A quiet period refills the bucket, so a second burst is allowed.
#[tokio::test(start_paused = true)]
async fn test_idle_period_restores_burst() {
    let channel = open_channel(&config(3, 1.0));
    channel.enqueue_all(&["a1", "a2", "a3"]).await.unwrap();

    tokio::time::sleep_until(channel.start + Duration::from_secs(10)).await;
    channel.enqueue_all(&["b1", "b2", "b3", "b4"]).await.unwrap();

    let (sent, _) = channel.finish().await;
    let second: Vec<_> = sent.iter().filter(|s| s.command.starts_with('b')).collect();
    assert_near(second[0].at, Duration::from_secs(10));
    assert_near(second[1].at, Duration::from_secs(10));
    assert_near(second[2].at, Duration::from_secs(10));
    assert_near(second[3].at, Duration::from_secs(11));
}

/// A refill that lands the bucket back at capacity keeps the partial
/// interval: after A at 0 and a backlog at 1.5s, the third command of the
/// backlog goes out at 2.0s.
#[tokio::test(start_paused = true)]
async fn test_refill_to_capacity_keeps_remainder() {
    let channel = open_channel(&config(2, 1.0));
    channel.enqueue_all(&["A"]).await.unwrap();

    tokio::time::sleep_until(channel.start + Duration::from_millis(1500)).await;
    channel.enqueue_all(&["B", "C", "D"]).await.unwrap();

    let (sent, _) = channel.finish().await;
    assert_eq!(commands(&sent), vec!["A", "B", "C", "D"]);
    assert_near(sent[0].at, Duration::ZERO);
    assert_near(sent[1].at, Duration::from_millis(1500));
    assert_near(sent[2].at, Duration::from_millis(1500));
    assert_near(sent[3].at, Duration::from_secs(2));
}

// ══════════════════════════════════════════════════════════════════════════════
//  Ordering
// ══════════════════════════════════════════════════════════════════════════════

/// Several producers share one channel; each producer's commands keep their
/// relative order and nothing is lost or duplicated.
#[tokio::test(start_paused = true)]
async fn test_fifo_per_producer() {
    let channel = open_channel(&config(4, 0.1));

    let mut producers = Vec::new();
    for p in 0..4 {
        let handle = channel.handle.clone();
        producers.push(tokio::spawn(async move {
            for n in 0..25 {
                handle.enqueue(format!("p{p}-{n:02}")).await.unwrap();
                if n % 7 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let (sent, stats) = channel.finish().await;
    assert_eq!(sent.len(), 100);
    assert_eq!(stats.sent, 100);
    for p in 0..4 {
        let prefix = format!("p{p}-");
        let own: Vec<_> = sent
            .iter()
            .filter(|s| s.command.starts_with(&prefix))
            .map(|s| s.command.clone())
            .collect();
        let expected: Vec<_> = (0..25).map(|n| format!("p{p}-{n:02}")).collect();
        assert_eq!(own, expected);
    }
}
