//! Loading screen session
//!
//! Wires a [`ResourceLoader`], a [`ProgressPresenter`] and a [`Watchdog`]
//! together the way the application's loading screen uses them: register
//! the startup resources, show the indicator at 0%, run everything, and hand
//! over to the main interface once the presenter is ready.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::LoaderConfig;
use crate::site::{register_lobby_assets, SiteConfig};
use crate::startup::fetch::AssetFetcher;
use crate::startup::loader::ResourceLoader;
use crate::startup::presenter::{PresenterSettings, ProgressPresenter};
use crate::startup::readiness::ReadinessSignal;
use crate::startup::registry::LoadStatus;
use crate::startup::resource::ResourceKind;
use crate::startup::strategy::StrategyDispatcher;
use crate::startup::watchdog::{Watchdog, WatchdogOutcome};

pub const FONTS_RESOURCE_ID: &str = "fonts_ready";
pub const CONFIG_RESOURCE_ID: &str = "config_main";

#[derive(Debug, Clone)]
pub struct SessionReport {
    /// The watchdog had to force the hand-over
    pub forced: bool,
    /// Loader state at hand-over time
    pub status: LoadStatus,
    pub elapsed: Duration,
}

pub struct LoadingSession {
    loader: Arc<ResourceLoader>,
    presenter: ProgressPresenter,
    config: LoaderConfig,
}

impl LoadingSession {
    /// Must be called inside a tokio runtime; the presenter starts immediately.
    pub fn new(loader: Arc<ResourceLoader>, config: LoaderConfig) -> Self {
        let presenter = ProgressPresenter::spawn(loader.subscribe(), PresenterSettings::from(&config));

        Self {
            loader,
            presenter,
            config,
        }
    }

    /// Build the standard strategies from `config` and the collaborators' signals.
    pub fn with_signals(
        config: LoaderConfig,
        fonts_ready: Option<ReadinessSignal>,
        renderer_ready: Option<ReadinessSignal>,
    ) -> Self {
        let fetcher = AssetFetcher::new(config.asset_root.clone(), config.request_timeout());
        let dispatcher = StrategyDispatcher::new(
            fetcher,
            fonts_ready,
            renderer_ready,
            config.min_durations.clone(),
        );
        let loader = Arc::new(ResourceLoader::from_config(dispatcher, &config));
        Self::new(loader, config)
    }

    pub fn loader(&self) -> &Arc<ResourceLoader> {
        &self.loader
    }

    pub fn presenter(&self) -> &ProgressPresenter {
        &self.presenter
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Font barrier, the site configuration document, and one
    /// skeleton+atlas pair per lobby, in that order.
    pub async fn register_startup_resources(&self, site: &SiteConfig) -> usize {
        self.loader
            .add_resource(FONTS_RESOURCE_ID, "", ResourceKind::Font)
            .await;
        self.loader
            .add_resource(CONFIG_RESOURCE_ID, &self.config.site_config_url, ResourceKind::Config)
            .await;
        register_lobby_assets(&self.loader, &site.memorial_lobbies).await;

        let total = self.loader.status().await.total;
        info!("Resource loader initialized with {} resources", total);
        total
    }

    /// Run the loading screen to completion.
    ///
    /// Always resolves: either every resource settled and the presenter
    /// finalized, or the watchdog forced the hand-over. In the forced case the
    /// run keeps going in the background and its results are ignored.
    pub async fn start(&self) -> SessionReport {
        let started = Instant::now();

        // Let the indicator render at 0% before anything moves
        tokio::time::sleep(self.config.show_delay()).await;

        let watchdog = Watchdog::arm(self.presenter.clone(), self.config.watchdog_ceiling());
        let loader = self.loader.clone();
        let run = tokio::spawn(async move { loader.run_all().await });

        self.presenter.wait_ready().await;
        let outcome = watchdog.outcome().await;
        let forced = matches!(outcome, WatchdogOutcome::Forced { .. });

        let status = if run.is_finished() {
            match run.await {
                Ok(status) => status,
                Err(_) => self.loader.status().await,
            }
        } else {
            self.loader.status().await
        };

        if forced {
            warn!(
                "Loading screen forced closed with {}/{} resources settled",
                status.loaded, status.total
            );
        } else {
            info!("Application ready after {:?}", started.elapsed());
        }

        SessionReport {
            forced,
            status,
            elapsed: started.elapsed(),
        }
    }

    /// Externally triggered early termination.
    pub fn force_complete(&self) -> bool {
        warn!("Forcing loading screen completion");
        self.presenter.force_finalize()
    }

    pub async fn reset(&self) {
        self.loader.reset().await;
    }
}
