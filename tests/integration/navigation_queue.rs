//! Integration tests for the navigation intent queue

use crate::integration::test_utils::{create_queue, RecordingSurface};
use navflow::intent::IntentKind;
use navflow::queue::{NavigationQueue, QueueConfig};
use navflow::scheduler::TokioScheduler;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::test(start_paused = true)]
async fn test_intents_before_ready_replay_in_order_with_spacing() {
    let surface = RecordingSurface::new();
    let queue = create_queue(Arc::clone(&surface));

    for target in ["A", "B", "C", "D", "E"] {
        queue.enqueue_navigate(target, json!({}));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(surface.calls().is_empty());

    queue.set_ready();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(surface.targets(), vec!["A", "B", "C", "D", "E"]);
    let calls = surface.calls();
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= MIN_INTERVAL);
    }
    assert_eq!(queue.stats().completed, 5);
}

#[tokio::test(start_paused = true)]
async fn test_reset_then_late_navigate() {
    let surface = RecordingSurface::new();
    let queue = create_queue(Arc::clone(&surface));
    let start = tokio::time::Instant::now();

    queue.enqueue_reset("MainTabs", json!({}));
    queue.set_ready();

    tokio::time::sleep(MIN_INTERVAL).await;
    queue.enqueue_navigate("Detail", json!({ "id": 7 }));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let calls = surface.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].kind, IntentKind::Reset);
    assert_eq!(calls[0].target, "MainTabs");
    assert_eq!(calls[0].at, start);
    assert_eq!(calls[1].kind, IntentKind::Navigate);
    assert_eq!(calls[1].target, "Detail");
    assert_eq!(calls[1].params["id"], 7);
    assert!(calls[1].at - calls[0].at >= MIN_INTERVAL);
    assert!(calls[1].at - start < MIN_INTERVAL + Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn test_set_ready_twice_runs_nothing_twice() {
    let surface = RecordingSurface::new();
    let queue = create_queue(Arc::clone(&surface));

    queue.enqueue_navigate("A", json!({}));
    queue.enqueue_navigate("B", json!({}));
    queue.set_ready();
    queue.set_ready();
    tokio::time::sleep(Duration::from_millis(100)).await;
    queue.set_ready();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(surface.targets(), vec!["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_from_inside_surface_call() {
    let surface = RecordingSurface::new();
    let queue = create_queue(Arc::clone(&surface));

    let reentrant = queue.clone();
    surface.on_call(move |target| {
        if target == "Home" {
            reentrant.enqueue_navigate("Onboarding", json!({}));
        }
    });

    queue.enqueue_navigate("Home", json!({}));
    queue.enqueue_navigate("Settings", json!({}));
    queue.set_ready();
    tokio::time::sleep(Duration::from_secs(2)).await;

    // The follow-up lands behind intents that were already queued.
    assert_eq!(surface.targets(), vec!["Home", "Settings", "Onboarding"]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_intent_does_not_block_queue() {
    let surface = RecordingSurface::rejecting(&["Missing"]);
    let queue = create_queue(Arc::clone(&surface));

    queue.enqueue_navigate("Missing", json!({}));
    queue.enqueue_navigate("Missing", json!({}));
    queue.enqueue_navigate("Profile", json!({}));
    queue.set_ready();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Each rejected intent gets exactly one attempt.
    assert_eq!(surface.targets(), vec!["Missing", "Missing", "Profile"]);
    let stats = queue.stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 0);
}

#[tokio::test(start_paused = true)]
async fn test_clear_keeps_queue_usable() {
    let surface = RecordingSurface::new();
    let queue = create_queue(Arc::clone(&surface));

    queue.set_ready();
    queue.enqueue_navigate("A", json!({}));
    queue.enqueue_navigate("B", json!({}));
    queue.enqueue_navigate("C", json!({}));
    assert_eq!(queue.clear(), 2);

    queue.enqueue_navigate("D", json!({}));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(surface.targets(), vec!["A", "D"]);
}

/// Whatever the targets, the surface sees them in enqueue order.
#[test]
fn test_fifo_order_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec("[A-Za-z]{1,8}", 1..20),
            |targets| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();
                let seen = runtime.block_on(async {
                    let surface = RecordingSurface::new();
                    let queue = NavigationQueue::new(
                        Arc::clone(&surface) as Arc<dyn navflow::DisplaySurface>,
                        Arc::new(TokioScheduler::current()),
                        QueueConfig {
                            min_interval_ms: 10,
                            max_pending: 64,
                        },
                    );
                    let (first, rest) = targets.split_at(targets.len() / 2);
                    for target in first {
                        queue.enqueue_navigate(target.as_str(), json!({}));
                    }
                    queue.set_ready();
                    for target in rest {
                        queue.enqueue_navigate(target.as_str(), json!({}));
                    }
                    tokio::time::sleep(Duration::from_millis(10 * (targets.len() as u64 + 1)))
                        .await;
                    surface.targets()
                });

                prop_assert_eq!(seen, targets);
                Ok(())
            },
        )
        .unwrap();
}
