//! Serial resource loading orchestrator
//!
//! Resources are loaded one at a time in registration order. Each resource
//! occupies at least its kind's minimum duration, and consecutive resources
//! are separated by a stagger delay so the progress signal advances in even
//! steps. Failures are recorded on the resource and count as settled, so a
//! run always finishes once every resource has been attempted.

use std::time::{Duration, Instant};

use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::LoaderConfig;
use crate::startup::registry::{LoadStatus, ResourceRegistry};
use crate::startup::resource::ResourceKind;
use crate::startup::strategy::StrategyDispatcher;

/// Result of attempting one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Settled,
    Skipped,
    /// The registry was reset underneath the run
    Abandoned,
}

pub struct ResourceLoader {
    registry: RwLock<ResourceRegistry>,
    dispatcher: StrategyDispatcher,
    stagger: Duration,
    status_tx: watch::Sender<LoadStatus>,
}

impl ResourceLoader {
    pub fn new(dispatcher: StrategyDispatcher, stagger: Duration) -> Self {
        let (status_tx, _) = watch::channel(LoadStatus::default());

        Self {
            registry: RwLock::new(ResourceRegistry::new()),
            dispatcher,
            stagger,
            status_tx,
        }
    }

    pub fn from_config(dispatcher: StrategyDispatcher, config: &LoaderConfig) -> Self {
        Self::new(dispatcher.with_floors(config.min_durations.clone()), config.stagger())
    }

    /// Observe every registry change as a fresh snapshot.
    pub fn subscribe(&self) -> watch::Receiver<LoadStatus> {
        self.status_tx.subscribe()
    }

    pub async fn add_resource(&self, id: &str, url: &str, kind: ResourceKind) -> bool {
        let mut registry = self.registry.write().await;
        let added = registry.add(id, url, kind);
        if added {
            self.publish(&registry);
        }
        added
    }

    pub async fn status(&self) -> LoadStatus {
        self.registry.read().await.snapshot()
    }

    /// Clear every resource and counter. A run in progress notices and stops
    /// without touching the cleared state.
    pub async fn reset(&self) {
        let mut registry = self.registry.write().await;
        if registry.is_loading() {
            warn!("Resetting resource loader while a run is in progress");
        }
        registry.reset();
        self.publish(&registry);
    }

    /// Load every pending resource serially, in registration order.
    ///
    /// Resolves once every resource has settled, whatever the individual
    /// outcomes. A call made while another run is loading is a no-op.
    pub async fn run_all(&self) -> LoadStatus {
        let generation = {
            let mut registry = self.registry.write().await;

            if registry.is_loading() {
                warn!("Resource run already in progress, ignoring");
                return registry.snapshot();
            }

            if registry.total() == 0 {
                registry.set_complete(true);
                self.publish(&registry);
                return registry.snapshot();
            }

            registry.set_complete(false);
            registry.set_loading(true);
            self.publish(&registry);
            registry.generation()
        };

        let span = info_span!("resource_run", run_id = %Uuid::new_v4());
        self.drive(generation).instrument(span).await
    }

    async fn drive(&self, generation: u64) -> LoadStatus {
        let run_started = Instant::now();
        info!("🚀 Loading {} resources", self.registry.read().await.total());

        let mut cursor = 0;
        let mut settled_any = false;

        loop {
            let next = {
                let registry = self.registry.read().await;
                if registry.generation() != generation {
                    return self.abandon(&registry);
                }
                registry.next_pending(cursor)
            };
            let Some((position, id)) = next else {
                break;
            };
            cursor = position + 1;

            if settled_any && !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }

            match self.load_one(generation, &id).await {
                Step::Settled => settled_any = true,
                Step::Skipped => debug!("Skipping {}, no longer pending", id),
                Step::Abandoned => return self.abandon(&*self.registry.read().await),
            }
        }

        // Complete first, then stop loading: observers may briefly see both set
        let mut registry = self.registry.write().await;
        if registry.generation() != generation {
            return self.abandon(&registry);
        }
        registry.set_complete(true);
        self.publish(&registry);
        registry.set_loading(false);
        self.publish(&registry);

        info!(
            "✅ All resources settled: {}/{} in {:?}",
            registry.settled(),
            registry.total(),
            run_started.elapsed()
        );
        registry.snapshot()
    }

    async fn load_one(&self, generation: u64, id: &str) -> Step {
        let resource = {
            let mut registry = self.registry.write().await;
            if registry.generation() != generation {
                return Step::Abandoned;
            }
            match registry.begin_loading(id) {
                Some(resource) => {
                    self.publish(&registry);
                    resource
                }
                None => return Step::Skipped,
            }
        };

        debug!("🔄 Loading {} ({}) as {}", resource.id, resource.url, resource.kind);
        let (strategy, floor) = self.dispatcher.dispatch(resource.kind);
        let started = Instant::now();
        let result = strategy.load(&resource).await;

        {
            let mut registry = self.registry.write().await;
            if registry.generation() != generation {
                return Step::Abandoned;
            }
            match &result {
                Ok(_) => info!("Resource loaded: {} ({:?})", id, started.elapsed()),
                Err(e) => error!("Resource failed: {}: {}", id, e),
            }
            registry.settle(id, result);
            self.publish(&registry);
        }

        let elapsed = started.elapsed();
        if elapsed < floor {
            tokio::time::sleep(floor - elapsed).await;
        }

        Step::Settled
    }

    fn abandon(&self, registry: &ResourceRegistry) -> LoadStatus {
        warn!("Registry was reset during the run, discarding remaining work");
        registry.snapshot()
    }

    fn publish(&self, registry: &ResourceRegistry) {
        self.status_tx.send_replace(registry.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinDurations;
    use crate::error::{LoadError, LoadResult};
    use crate::startup::resource::{Resource, ResourceStatus};
    use crate::startup::strategy::{LoadOutcome, LoadStrategy};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Succeed;

    #[async_trait]
    impl LoadStrategy for Succeed {
        async fn load(&self, _resource: &Resource) -> LoadResult<LoadOutcome> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(LoadOutcome::default())
        }
    }

    struct Fail;

    #[async_trait]
    impl LoadStrategy for Fail {
        async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome> {
            Err(LoadError::transport(&resource.url, "HTTP 404"))
        }
    }

    fn loader() -> ResourceLoader {
        let dispatcher = StrategyDispatcher::default()
            .with_floors(MinDurations::none())
            .with_strategy(ResourceKind::Generic, Arc::new(Succeed))
            .with_strategy(ResourceKind::Image, Arc::new(Fail));
        ResourceLoader::new(dispatcher, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_empty_run_completes_immediately() {
        let loader = loader();
        let status = loader.run_all().await;

        assert!(status.is_complete);
        assert!(!status.is_loading);
        assert_eq!(status.total, 0);
        assert_eq!(status.progress, 0.0);
    }

    #[tokio::test]
    async fn test_run_settles_everything() {
        let loader = loader();
        loader.add_resource("a", "a.bin", ResourceKind::Generic).await;
        loader.add_resource("b", "b.png", ResourceKind::Image).await;
        loader.add_resource("c", "c.bin", ResourceKind::Generic).await;

        let status = loader.run_all().await;

        assert_eq!(status.loaded, 3);
        assert_eq!(status.total, 3);
        assert_eq!(status.progress, 1.0);
        assert!(status.is_done());
        assert_eq!(status.resource("b").unwrap().status, ResourceStatus::Error);
        assert_eq!(status.resource("c").unwrap().status, ResourceStatus::Loaded);
    }

    #[tokio::test]
    async fn test_second_run_skips_settled_resources() {
        let loader = loader();
        loader.add_resource("a", "a.bin", ResourceKind::Generic).await;
        loader.run_all().await;

        loader.add_resource("b", "b.bin", ResourceKind::Generic).await;
        let status = loader.run_all().await;

        assert_eq!(status.loaded, 2);
        assert!(status.is_done());
    }

    #[tokio::test]
    async fn test_floor_is_slept_out() {
        let floors = MinDurations {
            generic: 40,
            ..MinDurations::none()
        };
        let dispatcher = StrategyDispatcher::default()
            .with_floors(floors)
            .with_strategy(ResourceKind::Generic, Arc::new(Succeed));
        let loader = ResourceLoader::new(dispatcher, Duration::ZERO);
        loader.add_resource("a", "a.bin", ResourceKind::Generic).await;

        let started = Instant::now();
        loader.run_all().await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_status_published_to_subscribers() {
        let loader = loader();
        let mut rx = loader.subscribe();
        loader.add_resource("a", "a.bin", ResourceKind::Generic).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().total, 1);

        loader.run_all().await;
        assert!(rx.borrow().is_done());
    }
}
