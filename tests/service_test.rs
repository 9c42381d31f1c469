//! Event service behavior against the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use eventq::engine::{EventService, Iteration, ServiceConfig, Worker, WorkerConfig, WorkerPool};
use eventq::error::Error;
use eventq::model::{EventId, State};
use eventq::store::{EventStore, MemoryStore};
use eventq::words::Dictionary;

fn service_with(store: &MemoryStore, poll_ms: u64, timeout_ms: u64) -> EventService {
    EventService::new(
        Arc::new(store.clone()),
        ServiceConfig {
            poll_interval: Duration::from_millis(poll_ms),
            sync_timeout: Duration::from_millis(timeout_ms),
        },
    )
}

fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        idle_interval: Duration::from_millis(5),
        error_backoff: Duration::from_millis(5),
        compute_delay: Duration::from_millis(20),
        max_candidate_attempts: 10,
    }
}

fn dictionary() -> Arc<Dictionary> {
    Arc::new(Dictionary::from_words(["casa", "carro", "arvore", "flor", "ceu", "terra"]).unwrap())
}

// ---------------------------------------------------------------------------
// Async creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_async_returns_pending_event() {
    let store = MemoryStore::new();
    let service = service_with(&store, 10, 100);

    let event = service.create_async().await.unwrap();
    assert_eq!(event.id, EventId(1));
    assert_eq!(event.state(), State::Pending);
    assert!(event.value.is_none());
    assert!(event.completed_at.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_issue_distinct_consecutive_ids() {
    let store = MemoryStore::new();
    let service = service_with(&store, 10, 100);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create_async().await.unwrap().id })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();

    let expected: Vec<EventId> = (1..=50).map(EventId).collect();
    assert_eq!(ids, expected);
    assert_eq!(service.count().await.unwrap(), 50);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_id_is_absent_not_an_error() {
    let store = MemoryStore::new();
    let service = service_with(&store, 10, 100);

    for _ in 0..3 {
        assert!(service.get_by_id(EventId(404)).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn repeated_reads_of_completed_event_are_identical() {
    let store = MemoryStore::new();
    let service = service_with(&store, 10, 100);
    let worker = Worker::new(Arc::new(store.clone()), dictionary(), fast_worker_config());

    let created = service.create_async().await.unwrap();
    assert!(worker.run_once().await.unwrap().did_work());

    let first = service.get_by_id(created.id).await.unwrap().unwrap();
    assert!(first.is_completed());
    for _ in 0..5 {
        assert_eq!(service.get_by_id(created.id).await.unwrap().unwrap(), first);
    }
}

#[tokio::test]
async fn three_events_one_iteration_completes_exactly_one() {
    let store = MemoryStore::new();
    let service = service_with(&store, 10, 100);
    let words = dictionary();
    let worker = Worker::new(Arc::new(store.clone()), words.clone(), fast_worker_config());

    let ids: Vec<EventId> = [
        service.create_async().await.unwrap(),
        service.create_async().await.unwrap(),
        service.create_async().await.unwrap(),
    ]
    .iter()
    .map(|e| e.id)
    .collect();
    assert_eq!(ids, vec![EventId(1), EventId(2), EventId(3)]);
    assert_eq!(service.count().await.unwrap(), 3);

    let iteration = worker.run_once().await.unwrap();
    assert!(matches!(iteration, Iteration::Completed(_)));

    let mut completed = Vec::new();
    for id in &ids {
        let event = service.get_by_id(*id).await.unwrap().unwrap();
        if let Some(value) = event.value {
            completed.push(value);
        }
    }
    assert_eq!(completed.len(), 1);
    assert!(words.contains(&completed[0]));
    assert_eq!(service.count().await.unwrap(), 3);
}

// ---------------------------------------------------------------------------
// Sync creation
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_sync_waits_for_a_worker() {
    let store = MemoryStore::new();
    let service = service_with(&store, 10, 5_000);
    let pool = WorkerPool::spawn(
        1,
        Arc::new(store.clone()),
        dictionary(),
        fast_worker_config(),
    );

    let event = service.create_sync().await.unwrap();
    assert!(event.is_completed());
    assert!(event.completed_at.is_some());

    // What the caller got back is the stored final state.
    let stored = service.get_by_id(event.id).await.unwrap().unwrap();
    assert_eq!(stored, event);

    pool.shutdown();
    pool.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn create_sync_times_out_and_leaves_event_pending() {
    let store = MemoryStore::new();
    let service = service_with(&store, 20, 100);

    let err = service.create_sync().await.unwrap_err();
    let (id, waited) = match err {
        Error::Timeout { id, waited } => (id, waited),
        other => panic!("expected Timeout, got {other:?}"),
    };
    assert!(waited >= Duration::from_millis(100));
    assert!(waited < Duration::from_millis(150));

    let event = service.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(event.state(), State::Pending);
}

#[tokio::test(start_paused = true)]
async fn timed_out_event_is_still_completed_later() {
    let store = MemoryStore::new();
    let service = service_with(&store, 20, 60);

    let id = match service.create_sync().await {
        Err(Error::Timeout { id, .. }) => id,
        other => panic!("expected Timeout, got {other:?}"),
    };

    let worker = Worker::new(Arc::new(store.clone()), dictionary(), fast_worker_config());
    assert!(worker.run_once().await.unwrap().did_work());
    assert!(service.get_by_id(id).await.unwrap().unwrap().is_completed());
}

#[tokio::test(start_paused = true)]
async fn value_observed_at_the_deadline_wins() {
    let store = MemoryStore::new();
    // A single poll that lands exactly on the deadline.
    let service = service_with(&store, 500, 100);
    let pool = WorkerPool::spawn(
        1,
        Arc::new(store.clone()),
        dictionary(),
        WorkerConfig {
            compute_delay: Duration::from_millis(50),
            ..fast_worker_config()
        },
    );

    let event = service.create_sync().await.unwrap();
    assert!(event.is_completed());

    pool.shutdown();
    pool.join().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sync_creates_all_get_unique_values() {
    let store = MemoryStore::new();
    let service = service_with(&store, 10, 10_000);
    let words: Vec<String> = (0..100).map(|i| format!("palavra{i}")).collect();
    let pool = WorkerPool::spawn(
        3,
        Arc::new(store.clone()),
        Arc::new(Dictionary::from_words(&words).unwrap()),
        fast_worker_config(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create_sync().await.unwrap() })
        })
        .collect();

    let mut values = HashSet::new();
    for handle in handles {
        let event = handle.await.unwrap();
        assert!(values.insert(event.value.unwrap()));
    }
    assert_eq!(values.len(), 8);
    assert_eq!(store.count().await.unwrap(), 8);

    pool.shutdown();
    pool.join().await.unwrap();
}
