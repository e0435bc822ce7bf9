//! Store failures, deadlines and cancellation.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{products, schema, BrokenExecutor, HangingExecutor, Product, SECRET_DETAIL};
use listing_core::{Error, ListRequest, PageRequest, RawFilters};
use listing_engine::{EngineConfig, ListingEngine, MemoryExecutor};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

fn fast_timeout() -> EngineConfig {
    EngineConfig {
        query_timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

#[traced_test]
#[tokio::test]
async fn backend_failure_is_generic_to_the_caller_and_detailed_in_logs() {
    let executor = Arc::new(BrokenExecutor::new());
    let engine: ListingEngine<Product> = ListingEngine::new(schema(), EngineConfig::default(), executor.clone());

    let err = engine
        .list(
            &ListRequest::new(PageRequest::offset(1, 20)).with_filter("category", "books"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, Error::Storage);
    assert!(!err.to_string().contains("hunter2"));
    let problem = err.to_problem("/products");
    assert_eq!(problem.status, 500);
    assert!(!problem.detail.contains("hunter2"));
    assert!(!serde_json::to_string(&problem).unwrap().contains("db.internal"));

    assert!(logs_contain("store call failed"));
    assert!(logs_contain("hunter2"));
    assert!(logs_contain("filter_nodes=1"));
    assert!(!problem.detail.contains(SECRET_DETAIL));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
}

#[traced_test]
#[tokio::test]
async fn slow_store_times_out() {
    let engine: ListingEngine<Product> = ListingEngine::new(schema(), fast_timeout(), Arc::new(HangingExecutor));

    let started = std::time::Instant::now();
    let err = engine
        .list(&ListRequest::new(PageRequest::first(10)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, Error::StorageTimeout);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.to_problem("/").status, 503);
    assert!(logs_contain("store call timed out"));
    assert!(logs_contain("elapsed_ms"));
}

#[tokio::test]
async fn caller_cancellation_stops_the_store_call() {
    let executor = Arc::new(MemoryExecutor::new(products(10)).with_latency(Duration::from_secs(30)));
    let engine: ListingEngine<Product> = ListingEngine::new(schema(), EngineConfig::default(), executor);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = engine
        .list(&ListRequest::new(PageRequest::offset(1, 10)), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn already_cancelled_request_never_waits() {
    let engine: ListingEngine<Product> = ListingEngine::new(schema(), EngineConfig::default(), Arc::new(HangingExecutor));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine
        .list(&ListRequest::new(PageRequest::first(10)), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Cancelled);
    assert_eq!(err.to_problem("/").status, 499);
}

#[tokio::test]
async fn validation_wins_over_a_broken_store() {
    let executor = Arc::new(BrokenExecutor::new());
    let engine: ListingEngine<Product> = ListingEngine::new(schema(), EngineConfig::default(), executor.clone());
    let err = engine
        .list(&ListRequest::new(PageRequest::offset(1, 500)), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
}

#[traced_test]
#[tokio::test]
async fn unsupported_facets_surface_as_storage_error() {
    let engine: ListingEngine<Product> = ListingEngine::new(schema(), EngineConfig::default(), Arc::new(HangingExecutor));
    let err = engine
        .facets(&RawFilters::new(), "category", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, Error::Storage);
    assert!(logs_contain("count_by"));
}
