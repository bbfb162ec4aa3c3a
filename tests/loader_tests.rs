use async_trait::async_trait;
use startgate::config::MinDurations;
use startgate::startup::{
    LoadOutcome, LoadStatus, LoadStrategy, Resource, ResourceKind, ResourceLoader, ResourceStatus,
    StrategyDispatcher,
};
use startgate::{LoadError, LoadResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Succeeds after a short delay
struct Delayed(Duration);

#[async_trait]
impl LoadStrategy for Delayed {
    async fn load(&self, _resource: &Resource) -> LoadResult<LoadOutcome> {
        tokio::time::sleep(self.0).await;
        Ok(LoadOutcome::default())
    }
}

/// Fails every resource whose url contains "bad"
struct FailBad;

#[async_trait]
impl LoadStrategy for FailBad {
    async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome> {
        if resource.url.contains("bad") {
            Err(LoadError::transport(&resource.url, "HTTP 500"))
        } else {
            Ok(LoadOutcome::default())
        }
    }
}

/// Counts invocations
struct Counting(Arc<AtomicUsize>);

#[async_trait]
impl LoadStrategy for Counting {
    async fn load(&self, _resource: &Resource) -> LoadResult<LoadOutcome> {
        self.0.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(LoadOutcome::default())
    }
}

/// Never resolves
struct Hang;

#[async_trait]
impl LoadStrategy for Hang {
    async fn load(&self, _resource: &Resource) -> LoadResult<LoadOutcome> {
        std::future::pending::<()>().await;
        Ok(LoadOutcome::default())
    }
}

fn loader_with(kind: ResourceKind, strategy: Arc<dyn LoadStrategy>) -> ResourceLoader {
    let dispatcher = StrategyDispatcher::default()
        .with_floors(MinDurations::none())
        .with_strategy(kind, strategy);
    ResourceLoader::new(dispatcher, Duration::from_millis(2))
}

#[tokio::test]
async fn test_total_counts_distinct_ids() {
    let loader = loader_with(ResourceKind::Generic, Arc::new(FailBad));

    assert!(loader.add_resource("a", "a", ResourceKind::Generic).await);
    assert!(loader.add_resource("b", "b", ResourceKind::Generic).await);
    assert!(!loader.add_resource("a", "again", ResourceKind::Image).await);
    assert!(loader.add_resource("c", "c", ResourceKind::Generic).await);

    let status = loader.status().await;
    assert_eq!(status.total, 3);
    assert_eq!(status.resource("a").unwrap().url, "a");
}

#[tokio::test]
async fn test_mixed_outcomes_still_complete() {
    let loader = loader_with(ResourceKind::Generic, Arc::new(FailBad));
    for (id, url) in [("one", "ok-1"), ("two", "bad-2"), ("three", "ok-3"), ("four", "bad-4")] {
        loader.add_resource(id, url, ResourceKind::Generic).await;
    }

    let status = loader.run_all().await;

    assert_eq!(status.loaded, status.total);
    assert!(!status.is_loading);
    assert!(status.is_complete);
    assert_eq!(status.progress, 1.0);
    assert_eq!(status.failed().count(), 2);

    let failed = status.resource("two").unwrap();
    assert_eq!(failed.status, ResourceStatus::Error);
    assert!(matches!(failed.failure, Some(LoadError::Transport { .. })));
}

#[tokio::test]
async fn test_resources_settle_in_registration_order() {
    let loader = loader_with(ResourceKind::Generic, Arc::new(Delayed(Duration::from_millis(3))));
    for i in 0..5 {
        loader
            .add_resource(&format!("r{}", i), "", ResourceKind::Generic)
            .await;
    }

    let status = loader.run_all().await;

    for pair in status.resources.windows(2) {
        let earlier_end = pair[0].finished_at.unwrap();
        let later_start = pair[1].started_at.unwrap();
        assert!(earlier_end <= later_start, "{} overlapped {}", pair[0].id, pair[1].id);
    }
}

#[tokio::test]
async fn test_raw_progress_is_monotonic() {
    let loader = Arc::new(loader_with(
        ResourceKind::Generic,
        Arc::new(Delayed(Duration::from_millis(2))),
    ));
    for i in 0..6 {
        loader
            .add_resource(&format!("r{}", i), "", ResourceKind::Generic)
            .await;
    }

    let mut updates = loader.subscribe();
    let observer = tokio::spawn(async move {
        let mut seen: Vec<LoadStatus> = Vec::new();
        while updates.changed().await.is_ok() {
            let status = updates.borrow_and_update().clone();
            let done = status.is_done();
            seen.push(status);
            if done {
                break;
            }
        }
        seen
    });

    loader.run_all().await;
    let seen = observer.await.unwrap();

    let mut last = 0.0;
    for status in &seen {
        assert!(status.progress >= last);
        last = status.progress;
        if status.is_complete {
            assert_eq!(status.progress, 1.0);
        }
    }
    assert_eq!(last, 1.0);
}

#[tokio::test]
async fn test_empty_batch_touches_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = loader_with(ResourceKind::Generic, Arc::new(Counting(calls.clone())));

    let status = tokio::time::timeout(Duration::from_millis(100), loader.run_all())
        .await
        .unwrap();

    assert!(status.is_complete);
    assert!(!status.is_loading);
    assert!(status.resources.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reentrant_run_is_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = Arc::new(loader_with(ResourceKind::Generic, Arc::new(Counting(calls.clone()))));
    for i in 0..3 {
        loader
            .add_resource(&format!("r{}", i), "", ResourceKind::Generic)
            .await;
    }

    let first = tokio::spawn({
        let loader = loader.clone();
        async move { loader.run_all().await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    // Second call while the first is loading returns at once
    let second = loader.run_all().await;
    assert!(second.is_loading);

    let first = first.await.unwrap();
    assert_eq!(first.loaded, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_reset_mid_run_leaves_clean_state() {
    let loader = Arc::new(loader_with(ResourceKind::Generic, Arc::new(Hang)));
    loader.add_resource("stuck", "", ResourceKind::Generic).await;

    let run = tokio::spawn({
        let loader = loader.clone();
        async move { loader.run_all().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(loader.status().await.is_loading);

    loader.reset().await;

    let status = loader.status().await;
    assert_eq!(status, LoadStatus::default());

    // A new batch can start while the abandoned strategy is still pending
    loader.add_resource("stuck", "", ResourceKind::Font).await;
    let status = loader.run_all().await;
    assert_eq!(status.loaded, 1);
    assert!(status.is_done());

    run.abort();
}

#[tokio::test]
async fn test_image_decode_failure_is_recorded() {
    let dir = tempdir().unwrap();
    image::RgbImage::new(8, 6).save(dir.path().join("ok.png")).unwrap();
    std::fs::write(dir.path().join("broken.png"), b"\x89PNG garbage").unwrap();

    let fetcher = startgate::startup::AssetFetcher::new(Some(dir.path().to_path_buf()), Duration::from_secs(1));
    let dispatcher = StrategyDispatcher::new(fetcher, None, None, MinDurations::none());
    let loader = ResourceLoader::new(dispatcher, Duration::ZERO);

    loader.add_resource("ok", "ok.png", ResourceKind::Image).await;
    loader.add_resource("broken", "broken.png", ResourceKind::Image).await;
    loader.add_resource("missing", "missing.png", ResourceKind::Image).await;

    let status = loader.run_all().await;

    assert!(status.is_done());
    assert_eq!(status.loaded, 3);
    assert_eq!(status.resource("ok").unwrap().size_hint.as_deref(), Some("8x6"));
    assert!(matches!(
        status.resource("broken").unwrap().failure,
        Some(LoadError::Decode { .. })
    ));
    assert!(matches!(
        status.resource("missing").unwrap().failure,
        Some(LoadError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_late_registration_reopens_the_batch() {
    let loader = loader_with(ResourceKind::Generic, Arc::new(FailBad));
    let status = loader.run_all().await;
    assert!(status.is_done());

    let mut updates = loader.subscribe();
    loader.add_resource("late", "", ResourceKind::Font).await;

    let status = updates.borrow_and_update().clone();
    assert_eq!(status.total, 1);
    assert_eq!(status.loaded, 0);
    assert!(!status.is_complete);
    assert!(!status.is_done());

    let status = loader.run_all().await;
    assert!(status.is_done());
    assert_eq!(status.loaded, 1);
}

#[tokio::test]
async fn test_stagger_separates_resources_but_does_not_trail() {
    let stagger = Duration::from_millis(40);
    let dispatcher = StrategyDispatcher::default()
        .with_floors(MinDurations::none())
        .with_strategy(ResourceKind::Generic, Arc::new(FailBad));
    let loader = ResourceLoader::new(dispatcher, stagger);
    for i in 0..3 {
        loader
            .add_resource(&format!("r{}", i), "ok", ResourceKind::Generic)
            .await;
    }

    let started = std::time::Instant::now();
    let status = loader.run_all().await;
    let elapsed = started.elapsed();

    for pair in status.resources.windows(2) {
        let gap = pair[1].started_at.unwrap() - pair[0].finished_at.unwrap();
        assert!(gap >= stagger, "gap between {} and {} was {:?}", pair[0].id, pair[1].id, gap);
    }

    // Two gaps for three resources, nothing after the last one
    assert!(elapsed >= stagger * 2);
    assert!(elapsed < stagger * 3, "run took {:?}", elapsed);
}
