//! Integration tests for single-flight loading and queue handoff

use crate::integration::test_utils::{
    create_coordinator, transient, RecordingSurface, ScriptedFetcher,
};
use navflow::coordinator::Handoff;
use navflow::error::{FetchError, LoadError};
use navflow::intent::IntentKind;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Collects failure callback invocations.
fn failure_sink() -> (Arc<Mutex<Vec<LoadError>>>, impl Fn() -> Box<dyn FnOnce(LoadError) + Send>) {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let make = move || -> Box<dyn FnOnce(LoadError) + Send> {
        let sink = Arc::clone(&sink);
        Box::new(move |err| sink.lock().push(err))
    };
    (failures, make)
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_fetch() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::with_latency(Duration::from_millis(100));
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    let first = coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    let second =
        coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    assert!(first.started_fetch());
    assert!(!second.started_fetch());
    assert!(coordinator.is_loading("order-42"));

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fetcher.fetch_count("order-42"), 1);
    assert_eq!(surface.targets(), vec!["OrderDetail"]);
    assert!(failures.lock().is_empty());
    assert!(!coordinator.is_loading("order-42"));

    let stats = coordinator.stats();
    assert_eq!(stats.attached, 1);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded_and_failure_reported_once() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.script(
        "order-42",
        vec![transient("offline"), transient("offline"), transient("offline")],
    );
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(fetcher.fetch_count("order-42"), 3);
    let failures = failures.lock();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        LoadError::Exhausted { attempts: 3, last_error: FetchError::Transient(_), .. }
    ));
    assert!(surface.calls().is_empty());
    assert!(!coordinator.is_loading("order-42"));
}

#[tokio::test(start_paused = true)]
async fn test_linear_backoff_then_handoff_with_entity() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.script(
        "r-7",
        vec![
            transient("timeout"),
            transient("timeout"),
            Ok(json!({ "name": "Corner Cafe" })),
        ],
    );
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    coordinator.load_and_handoff("r-7", Handoff::navigate("RestaurantDetail"), on_failure());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(coordinator.attempt("r-7"), Some(1));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let times = fetcher.fetch_times("r-7");
    assert_eq!(times.len(), 3);
    let tolerance = Duration::from_millis(5);
    assert!(times[1] - times[0] >= BASE_DELAY);
    assert!(times[1] - times[0] < BASE_DELAY + tolerance);
    assert!(times[2] - times[1] >= BASE_DELAY * 2);
    assert!(times[2] - times[1] < BASE_DELAY * 2 + tolerance);

    let calls = surface.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, IntentKind::Navigate);
    assert_eq!(calls[0].target, "RestaurantDetail");
    assert_eq!(calls[0].params["entityId"], "r-7");
    assert_eq!(calls[0].params["entity"]["name"], "Corner Cafe");
    assert!(calls[0].at >= times[2]);
    assert!(failures.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_same_id_can_load_again_after_terminal_failure() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.script(
        "order-42",
        vec![Err(FetchError::NotFound("order-42".to_string()))],
    );
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fetcher.fetch_count("order-42"), 1);
    assert!(matches!(
        failures.lock().as_slice(),
        [LoadError::Rejected { .. }]
    ));

    let ticket =
        coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    assert!(ticket.started_fetch());
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fetcher.fetch_count("order-42"), 2);
    assert_eq!(surface.targets(), vec!["OrderDetail"]);
    assert_eq!(failures.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_gets_no_callback() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::with_latency(Duration::from_millis(100));
    fetcher.script(
        "order-42",
        vec![Err(FetchError::Permanent("forbidden".to_string()))],
    );
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    let first = coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    let _second =
        coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    assert!(first.cancel());
    assert!(!first.cancel());

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(failures.lock().len(), 1);
    assert!(!first.cancel());
}

#[tokio::test(start_paused = true)]
async fn test_load_and_wait_returns_enqueued_intent() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));

    coordinator
        .load_and_wait("user-1", Handoff::navigate("Profile"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let calls = surface.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, "Profile");
    assert_eq!(calls[0].params["entity"]["id"], "user-1");
}

#[tokio::test(start_paused = true)]
async fn test_load_and_wait_reports_terminal_error() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.script("user-1", vec![Err(FetchError::NotFound("user-1".to_string()))]);
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));

    let result = coordinator
        .load_and_wait("user-1", Handoff::navigate("Profile"))
        .await;
    assert!(matches!(result, Err(LoadError::Rejected { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_deep_link_resets_before_navigating() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));

    coordinator
        .load_and_wait("r-9", Handoff::deep_link("MainTabs", "RestaurantDetail"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let calls = surface.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].kind, IntentKind::Reset);
    assert_eq!(calls[0].target, "MainTabs");
    assert_eq!(calls[1].kind, IntentKind::Navigate);
    assert_eq!(calls[1].target, "RestaurantDetail");
    assert_eq!(calls[1].params["entityId"], "r-9");
    assert!(calls[1].at - calls[0].at >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_id_fails_without_fetch() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    let ticket = coordinator.load_and_handoff("  ", Handoff::navigate("OrderDetail"), on_failure());
    assert!(!ticket.started_fetch());
    assert!(!ticket.cancel());
    // Reported synchronously.
    assert!(matches!(
        failures.lock().as_slice(),
        [LoadError::InvalidRequest(_)]
    ));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fetcher.fetch_count("  "), 0);
    assert!(surface.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_load_skips_handoff() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::with_latency(Duration::from_millis(200));
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));

    let waited = tokio::time::timeout(
        Duration::from_millis(50),
        coordinator.load_and_wait("order-42", Handoff::navigate("OrderDetail")),
    )
    .await;
    assert!(waited.is_err());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fetcher.fetch_count("order-42"), 1);
    assert!(surface.calls().is_empty());
    assert_eq!(coordinator.stats().discarded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_during_backoff_attaches_to_running_chain() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.script(
        "order-42",
        vec![transient("offline"), transient("offline"), transient("offline")],
    );
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    let first = coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(fetcher.fetch_count("order-42"), 1);
    assert!(coordinator.is_loading("order-42"));

    let second =
        coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    assert!(first.started_fetch());
    assert!(!second.started_fetch());

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(fetcher.fetch_count("order-42"), 3);
    let failures = failures.lock();
    assert_eq!(failures.len(), 2);
    assert!(failures
        .iter()
        .all(|err| matches!(err, LoadError::Exhausted { attempts: 3, .. })));
    assert_eq!(coordinator.stats().attached, 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_id_can_load_again_after_success() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::new();
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    let first = coordinator.load_and_handoff("d-1", Handoff::navigate("Detail"), on_failure());
    assert!(first.started_fetch());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!coordinator.is_loading("d-1"));

    let second = coordinator.load_and_handoff("d-1", Handoff::navigate("Detail"), on_failure());
    assert!(second.started_fetch());
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fetcher.fetch_count("d-1"), 2);
    assert_eq!(surface.targets(), vec!["Detail", "Detail"]);
    assert_eq!(coordinator.stats().succeeded, 2);
    assert!(failures.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_ticket_discards_loaded_entity() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::with_latency(Duration::from_millis(100));
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));
    let (failures, on_failure) = failure_sink();

    let ticket = coordinator.load_and_handoff("order-42", Handoff::navigate("OrderDetail"), on_failure());
    assert!(ticket.cancel());
    // The fetch chain keeps running without any caller.
    assert!(coordinator.is_loading("order-42"));

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fetcher.fetch_count("order-42"), 1);
    assert!(surface.calls().is_empty());
    assert!(failures.lock().is_empty());
    let stats = coordinator.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_across_worker_threads() {
    let surface = RecordingSurface::new();
    let fetcher = ScriptedFetcher::with_latency(Duration::from_millis(200));
    let coordinator = create_coordinator(Arc::clone(&surface), Arc::clone(&fetcher));

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .load_and_wait("shared", Handoff::navigate("Detail"))
                    .await
            })
        })
        .collect();

    let mut intent_ids = Vec::new();
    for caller in callers {
        intent_ids.push(caller.await.unwrap().unwrap());
    }
    // The handoff intent is enqueued before the queue drains it.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(fetcher.fetch_count("shared"), 1);
    intent_ids.dedup();
    assert_eq!(intent_ids.len(), 1);
    assert_eq!(surface.targets(), vec!["Detail"]);
    assert_eq!(coordinator.stats().attached, 15);
}
