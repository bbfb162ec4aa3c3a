use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::LoadResult;
use crate::startup::estimator;
use crate::startup::resource::{Resource, ResourceKind, ResourceStatus};
use crate::startup::strategy::LoadOutcome;

/// Read-only snapshot of the registry and run flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadStatus {
    /// Settled count (loaded and failed resources alike)
    pub loaded: usize,
    pub total: usize,
    /// Raw progress, `loaded / total`
    pub progress: f64,
    pub is_loading: bool,
    pub is_complete: bool,
    /// Resources in registration order
    pub resources: Vec<Resource>,
}

impl LoadStatus {
    /// The only "done" signal: complete and no longer loading.
    pub fn is_done(&self) -> bool {
        self.is_complete && !self.is_loading
    }

    pub fn in_flight(&self) -> usize {
        self.resources
            .iter()
            .filter(|resource| resource.status.is_loading())
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &Resource> {
        self.resources
            .iter()
            .filter(|resource| resource.status == ResourceStatus::Error)
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.id == id)
    }
}

/// Registered resources plus aggregate counters.
///
/// Resources are kept in registration order; `index` maps ids to positions.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    settled: usize,
    is_loading: bool,
    is_complete: bool,
    generation: u64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource in `Pending` status. Duplicate ids are skipped.
    pub fn add(&mut self, id: &str, url: &str, kind: ResourceKind) -> bool {
        if self.index.contains_key(id) {
            warn!("Resource {} already registered, skipping", id);
            return false;
        }

        self.index.insert(id.to_string(), self.resources.len());
        self.resources.push(Resource::new(id, url, kind));
        // A pending resource means the batch is no longer complete
        self.is_complete = false;
        debug!("Registered resource {} ({}) as {}", id, url, kind);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.index.get(id).map(|&position| &self.resources[position])
    }

    /// Clear every resource, counter and flag in one step.
    pub fn reset(&mut self) {
        self.resources.clear();
        self.index.clear();
        self.settled = 0;
        self.is_loading = false;
        self.is_complete = false;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn total(&self) -> usize {
        self.resources.len()
    }

    pub fn settled(&self) -> usize {
        self.settled
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn progress(&self) -> f64 {
        estimator::raw_progress(self.settled, self.total())
    }

    /// Incremented on every reset; runs compare it to detect a reset mid-load.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ids(&self) -> Vec<String> {
        self.resources.iter().map(|resource| resource.id.clone()).collect()
    }

    pub fn snapshot(&self) -> LoadStatus {
        LoadStatus {
            loaded: self.settled,
            total: self.total(),
            progress: self.progress(),
            is_loading: self.is_loading,
            is_complete: self.is_complete,
            resources: self.resources.clone(),
        }
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub(crate) fn set_complete(&mut self, complete: bool) {
        self.is_complete = complete;
    }

    /// First pending resource at or after `from`, in registration order.
    pub(crate) fn next_pending(&self, from: usize) -> Option<(usize, String)> {
        self.resources
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, resource)| resource.status.is_pending())
            .map(|(position, resource)| (position, resource.id.clone()))
    }

    /// Move a pending resource to `Loading`, returning a copy for the strategy.
    pub(crate) fn begin_loading(&mut self, id: &str) -> Option<Resource> {
        let position = *self.index.get(id)?;
        let resource = &mut self.resources[position];
        if resource.begin() {
            Some(resource.clone())
        } else {
            None
        }
    }

    /// Record the outcome of a load attempt. Both outcomes count as settled.
    pub(crate) fn settle(&mut self, id: &str, result: LoadResult<LoadOutcome>) -> bool {
        let Some(&position) = self.index.get(id) else {
            return false;
        };
        let resource = &mut self.resources[position];
        let applied = match result {
            Ok(outcome) => resource.complete(outcome.size_hint),
            Err(error) => resource.fail(error),
        };
        if applied {
            self.settled += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;

    #[test]
    fn test_add_and_duplicates() {
        let mut registry = ResourceRegistry::new();

        assert!(registry.add("fonts_ready", "", ResourceKind::Font));
        assert!(registry.add("config_main", "_config.toml", ResourceKind::Config));
        assert!(!registry.add("fonts_ready", "other", ResourceKind::Generic));

        assert_eq!(registry.total(), 2);
        assert_eq!(registry.settled(), 0);
        let font = registry.get("fonts_ready").unwrap();
        assert_eq!(font.url, "");
        assert_eq!(font.kind, ResourceKind::Font);
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.ids(), vec!["fonts_ready", "config_main"]);
    }

    #[test]
    fn test_settle_counts_failures() {
        let mut registry = ResourceRegistry::new();
        registry.add("a", "a.png", ResourceKind::Image);
        registry.add("b", "b.bin", ResourceKind::Generic);

        assert!(registry.begin_loading("a").is_some());
        assert!(registry.settle("a", Ok(LoadOutcome::with_size(2, 2))));
        assert_eq!(registry.progress(), 0.5);

        assert!(registry.begin_loading("b").is_some());
        assert!(registry.settle("b", Err(LoadError::transport("b.bin", "HTTP 404"))));
        assert_eq!(registry.settled(), 2);
        assert_eq!(registry.progress(), 1.0);

        // A second settle is ignored
        assert!(!registry.settle("b", Ok(LoadOutcome::default())));
        assert_eq!(registry.settled(), 2);

        let status = registry.snapshot();
        assert_eq!(status.failed().count(), 1);
        assert_eq!(status.resource("a").unwrap().size_hint.as_deref(), Some("2x2"));
    }

    #[test]
    fn test_next_pending_follows_registration_order() {
        let mut registry = ResourceRegistry::new();
        registry.add("first", "", ResourceKind::Font);
        registry.add("second", "", ResourceKind::Generic);
        registry.add("third", "", ResourceKind::Generic);

        assert_eq!(registry.next_pending(0), Some((0, "first".to_string())));
        registry.begin_loading("first");
        assert_eq!(registry.next_pending(0), Some((1, "second".to_string())));
        assert_eq!(registry.next_pending(2), Some((2, "third".to_string())));
        assert_eq!(registry.next_pending(3), None);
        assert!(registry.begin_loading("first").is_none());
    }

    #[test]
    fn test_add_after_completion_clears_complete() {
        let mut registry = ResourceRegistry::new();
        registry.set_complete(true);
        assert!(registry.snapshot().is_done());

        assert!(registry.add("late", "", ResourceKind::Font));
        assert!(!registry.is_complete());
        assert!(!registry.snapshot().is_done());

        // A duplicate leaves the flags alone
        registry.begin_loading("late");
        registry.settle("late", Ok(LoadOutcome::default()));
        registry.set_complete(true);
        assert!(!registry.add("late", "", ResourceKind::Font));
        assert!(registry.is_complete());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut registry = ResourceRegistry::new();
        registry.add("a", "", ResourceKind::Font);
        registry.begin_loading("a");
        registry.settle("a", Ok(LoadOutcome::default()));
        registry.set_loading(true);
        registry.set_complete(true);
        let generation = registry.generation();

        registry.reset();

        assert_eq!(registry.total(), 0);
        assert_eq!(registry.settled(), 0);
        assert!(!registry.is_loading());
        assert!(!registry.is_complete());
        assert!(registry.get("a").is_none());
        assert_ne!(registry.generation(), generation);
        assert_eq!(registry.snapshot(), LoadStatus::default());

        // Ids are free again after a reset
        assert!(registry.add("a", "", ResourceKind::Font));
    }
}
