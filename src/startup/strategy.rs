//! Load strategies per resource kind and the dispatcher that selects them
//!
//! Each strategy performs the actual work for one resource and resolves or
//! rejects. Strategies never pace themselves: the minimum-duration floor that
//! keeps instant resources from making the progress indicator jump is looked
//! up here but slept out by the loader.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::GenericImageView;
use tracing::{debug, warn};

use crate::config::MinDurations;
use crate::error::{LoadError, LoadResult};
use crate::startup::fetch::AssetFetcher;
use crate::startup::readiness::ReadinessSignal;
use crate::startup::resource::{Resource, ResourceKind};

/// What a successful load produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOutcome {
    /// `"{width}x{height}"` for decoded images
    pub size_hint: Option<String>,
}

impl LoadOutcome {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            size_hint: Some(format!("{}x{}", width, height)),
        }
    }
}

/// Loading procedure for one kind of resource
#[async_trait]
pub trait LoadStrategy: Send + Sync {
    async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome>;
}

/// Waits for the platform font system. Failures only warn.
pub struct FontStrategy {
    fonts_ready: Option<ReadinessSignal>,
}

impl FontStrategy {
    pub fn new(fonts_ready: Option<ReadinessSignal>) -> Self {
        Self { fonts_ready }
    }
}

#[async_trait]
impl LoadStrategy for FontStrategy {
    async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome> {
        let Some(signal) = &self.fonts_ready else {
            debug!("No font readiness signal, treating {} as ready", resource.id);
            return Ok(LoadOutcome::default());
        };

        if let Err(e) = signal.wait().await {
            warn!("Font loading warning for {}: {}", resource.id, e);
        }
        Ok(LoadOutcome::default())
    }
}

/// Fetches the site configuration document and checks that it parses.
pub struct ConfigStrategy {
    fetcher: AssetFetcher,
}

impl ConfigStrategy {
    pub fn new(fetcher: AssetFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl LoadStrategy for ConfigStrategy {
    async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome> {
        let text = self.fetcher.fetch_text(&resource.url).await?;

        if resource.url.ends_with(".toml") {
            toml::from_str::<toml::Table>(&text)
                .map_err(|e| LoadError::decode(&resource.url, e.to_string()))?;
        } else {
            serde_json::from_str::<serde_json::Value>(&text)
                .map_err(|e| LoadError::decode(&resource.url, e.to_string()))?;
        }

        Ok(LoadOutcome::default())
    }
}

/// Defers to the rendering engine's readiness signal. Never rejects.
pub struct CharacterAssetStrategy {
    renderer_ready: Option<ReadinessSignal>,
}

impl CharacterAssetStrategy {
    pub fn new(renderer_ready: Option<ReadinessSignal>) -> Self {
        Self { renderer_ready }
    }
}

#[async_trait]
impl LoadStrategy for CharacterAssetStrategy {
    async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome> {
        match &self.renderer_ready {
            None => debug!("No renderer attached, {} is not applicable", resource.id),
            Some(signal) => {
                if let Err(e) = signal.wait().await {
                    warn!("Renderer readiness lost while loading {}: {}", resource.id, e);
                }
            }
        }
        Ok(LoadOutcome::default())
    }
}

/// Fetches and decodes an image, capturing its dimensions.
pub struct ImageStrategy {
    fetcher: AssetFetcher,
}

impl ImageStrategy {
    pub fn new(fetcher: AssetFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl LoadStrategy for ImageStrategy {
    async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome> {
        let bytes = self.fetcher.fetch(&resource.url).await?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| LoadError::decode(&resource.url, e.to_string()))?;
        let (width, height) = image.dimensions();
        Ok(LoadOutcome::with_size(width, height))
    }
}

/// Plain fetch; anything but success rejects.
pub struct GenericStrategy {
    fetcher: AssetFetcher,
}

impl GenericStrategy {
    pub fn new(fetcher: AssetFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl LoadStrategy for GenericStrategy {
    async fn load(&self, resource: &Resource) -> LoadResult<LoadOutcome> {
        self.fetcher.fetch(&resource.url).await?;
        Ok(LoadOutcome::default())
    }
}

/// Maps a resource kind to its strategy and minimum-duration floor.
#[derive(Clone)]
pub struct StrategyDispatcher {
    strategies: HashMap<ResourceKind, Arc<dyn LoadStrategy>>,
    floors: MinDurations,
}

impl StrategyDispatcher {
    /// Standard strategies for every kind.
    pub fn new(
        fetcher: AssetFetcher,
        fonts_ready: Option<ReadinessSignal>,
        renderer_ready: Option<ReadinessSignal>,
        floors: MinDurations,
    ) -> Self {
        let mut strategies: HashMap<ResourceKind, Arc<dyn LoadStrategy>> = HashMap::new();
        strategies.insert(ResourceKind::Font, Arc::new(FontStrategy::new(fonts_ready)));
        strategies.insert(ResourceKind::Config, Arc::new(ConfigStrategy::new(fetcher.clone())));
        strategies.insert(
            ResourceKind::CharacterAsset,
            Arc::new(CharacterAssetStrategy::new(renderer_ready)),
        );
        strategies.insert(ResourceKind::Image, Arc::new(ImageStrategy::new(fetcher.clone())));
        strategies.insert(ResourceKind::Generic, Arc::new(GenericStrategy::new(fetcher)));

        Self { strategies, floors }
    }

    /// Replace the strategy used for one kind.
    pub fn with_strategy(mut self, kind: ResourceKind, strategy: Arc<dyn LoadStrategy>) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn with_floors(mut self, floors: MinDurations) -> Self {
        self.floors = floors;
        self
    }

    pub fn floor(&self, kind: ResourceKind) -> Duration {
        self.floors.for_kind(kind)
    }

    pub fn dispatch(&self, kind: ResourceKind) -> (Arc<dyn LoadStrategy>, Duration) {
        let strategy = self
            .strategies
            .get(&kind)
            .or_else(|| self.strategies.get(&ResourceKind::Generic))
            .cloned()
            .unwrap_or_else(|| Arc::new(GenericStrategy::new(AssetFetcher::default())));
        (strategy, self.floor(kind))
    }
}

impl Default for StrategyDispatcher {
    fn default() -> Self {
        Self::new(AssetFetcher::default(), None, None, MinDurations::default())
    }
}
