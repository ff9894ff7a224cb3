//! Resource manager: lazy launch, retry with cleanup, health checks

mod common;

use std::sync::atomic::Ordering;

use common::FakeLauncher;
use webdown::browser::{CleanupResult, RenderingResource, ResourceManager};

#[tokio::test]
async fn launch_is_lazy_and_single_flight() {
    let launcher = FakeLauncher::new(vec![]);
    let manager = ResourceManager::new(launcher.clone(), 3);
    assert!(!manager.is_active().await);
    assert_eq!(launcher.launch_count(), 0);

    let results = futures::future::join_all((0..5).map(|_| manager.ensure())).await;
    assert!(results.into_iter().all(|ok| ok));
    assert_eq!(launcher.launch_count(), 1);
    assert!(manager.probe().await);
}

#[tokio::test]
async fn failed_launches_clean_up_sessions_and_retry() {
    let launcher = FakeLauncher::new(vec![])
        .failing(2)
        .with_sessions(&["s1", "s2", "stuck"], &["stuck"]);
    let manager = ResourceManager::new(launcher.clone(), 3);

    assert!(manager.ensure().await);
    assert_eq!(launcher.launch_count(), 3);

    let closed = launcher.closed_sessions.lock().await.clone();
    assert_eq!(closed, vec!["s1", "s2"]);
    assert_eq!(*launcher.sessions.lock().await, vec!["stuck"]);
}

#[tokio::test]
async fn exhausted_budget_reports_unavailable() {
    let launcher = FakeLauncher::new(vec![]).failing(5);
    let manager = ResourceManager::new(launcher.clone(), 3);

    assert!(!manager.ensure().await);
    assert_eq!(launcher.launch_count(), 3);
    assert!(!manager.is_active().await);
    assert!(manager.acquire_page().await.is_err());
}

#[tokio::test]
async fn dead_handle_is_replaced() {
    let launcher = FakeLauncher::new(vec![]);
    let manager = ResourceManager::new(launcher.clone(), 3);
    assert!(manager.ensure().await);

    launcher.alive.store(false, Ordering::SeqCst);
    assert!(!manager.probe().await);
    assert!(manager.ensure().await);

    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(launcher.handle_closes.load(Ordering::SeqCst), 1);
    assert!(manager.probe().await);
}

#[tokio::test]
async fn cleanup_collects_failures_and_keeps_live_session() {
    let launcher = FakeLauncher::new(vec![]).with_sessions(&["live", "old", "stuck"], &["stuck"]);
    let manager = ResourceManager::new(launcher.clone(), 3);

    match manager.cleanup_orphaned_sessions(Some("live")).await {
        CleanupResult::PartialFailure { closed, errors } => {
            assert_eq!(closed, 1);
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("stuck"));
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert_eq!(*launcher.closed_sessions.lock().await, vec!["old"]);
}

#[tokio::test]
async fn shutdown_closes_the_handle_and_pages_release() {
    let launcher = FakeLauncher::new(vec![]);
    let manager = ResourceManager::new(launcher.clone(), 3);
    assert!(manager.ensure().await);

    let page = manager.acquire_page().await.unwrap();
    page.release().await;
    assert_eq!(launcher.log.open_pages(), 0);

    manager.shutdown().await;
    assert!(!manager.is_active().await);
    assert_eq!(launcher.handle_closes.load(Ordering::SeqCst), 1);

    // Idempotent.
    manager.shutdown().await;
    assert_eq!(launcher.handle_closes.load(Ordering::SeqCst), 1);
}
