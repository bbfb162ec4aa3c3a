//! Animated progress for the loading indicator
//!
//! The presenter follows the loader's status snapshots, derives a target
//! value from them, and eases a displayed value toward that target on every
//! animation tick. Once loading is done it waits a short grace period and
//! finalizes: percent pinned to 1.0, `loading` off, `ready` on.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::LoaderConfig;
use crate::startup::estimator;
use crate::startup::registry::LoadStatus;

/// What the loading screen renders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenterView {
    pub loading: bool,
    /// Displayed progress in `[0, 1]`
    pub percent: f64,
    pub ready: bool,
}

impl Default for PresenterView {
    fn default() -> Self {
        Self {
            loading: true,
            percent: 0.0,
            ready: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenterSettings {
    pub tick: Duration,
    pub smoothing_factor: f64,
    pub settle_epsilon: f64,
    pub finalize_grace: Duration,
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self::from(&LoaderConfig::default())
    }
}

impl From<&LoaderConfig> for PresenterSettings {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            tick: config.tick(),
            smoothing_factor: config.smoothing_factor,
            settle_epsilon: config.settle_epsilon,
            finalize_grace: config.finalize_grace(),
        }
    }
}

struct PresenterShared {
    view_tx: watch::Sender<PresenterView>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the presenter; clones share the same view.
#[derive(Clone)]
pub struct ProgressPresenter {
    shared: Arc<PresenterShared>,
}

impl ProgressPresenter {
    /// Start following `status_rx`. Must be called inside a tokio runtime.
    pub fn spawn(status_rx: watch::Receiver<LoadStatus>, settings: PresenterSettings) -> Self {
        let (view_tx, _) = watch::channel(PresenterView::default());
        let shared = Arc::new(PresenterShared {
            view_tx,
            driver: Mutex::new(None),
        });

        let driver = tokio::spawn(drive(shared.clone(), status_rx, settings));
        if let Ok(mut slot) = shared.driver.lock() {
            *slot = Some(driver);
        }

        Self { shared }
    }

    pub fn view(&self) -> PresenterView {
        *self.shared.view_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PresenterView> {
        self.shared.view_tx.subscribe()
    }

    pub fn loading(&self) -> bool {
        self.view().loading
    }

    pub fn percent(&self) -> f64 {
        self.view().percent
    }

    pub fn ready(&self) -> bool {
        self.view().ready
    }

    /// Resolves once the presenter has finalized, naturally or forced.
    pub async fn wait_ready(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `shared`, which `self` keeps alive
        let _ = rx.wait_for(|view| view.ready).await;
    }

    /// Finalize immediately and stop the animation.
    ///
    /// Returns false when the presenter had already finalized.
    pub fn force_finalize(&self) -> bool {
        let finalized = finalize(&self.shared);
        if finalized {
            if let Ok(mut slot) = self.shared.driver.lock() {
                if let Some(driver) = slot.take() {
                    driver.abort();
                }
            }
        }
        finalized
    }
}

/// Pin the view to its final state. Only the first call has an effect.
fn finalize(shared: &PresenterShared) -> bool {
    shared.view_tx.send_if_modified(|view| {
        if view.ready {
            return false;
        }
        view.percent = 1.0;
        view.loading = false;
        view.ready = true;
        true
    })
}

/// One easing step. Returns true while the chase should continue.
fn step_toward(shared: &PresenterShared, target: f64, settings: &PresenterSettings) -> bool {
    let mut chasing = false;
    shared.view_tx.send_if_modified(|view| {
        if view.ready {
            return false;
        }
        let gap = target - view.percent;
        if gap.abs() < settings.settle_epsilon {
            view.percent = target;
        } else {
            view.percent += gap * settings.smoothing_factor;
            chasing = true;
        }
        true
    });
    chasing
}

async fn drive(
    shared: Arc<PresenterShared>,
    mut status_rx: watch::Receiver<LoadStatus>,
    settings: PresenterSettings,
) {
    let mut ticker = tokio::time::interval(settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut target = 0.0_f64;
    let mut chasing = false;
    let mut finalize_at: Option<Instant> = None;
    let mut status_open = true;

    // Account for whatever the loader already did before we subscribed
    let initial = status_rx.borrow_and_update().clone();
    retarget(&initial, &mut target, &mut chasing, &mut finalize_at, &settings);

    loop {
        tokio::select! {
            changed = status_rx.changed(), if status_open => {
                if changed.is_err() {
                    status_open = false;
                    continue;
                }
                let status = status_rx.borrow_and_update().clone();
                retarget(&status, &mut target, &mut chasing, &mut finalize_at, &settings);
            }
            _ = ticker.tick(), if chasing => {
                chasing = step_toward(&shared, target, &settings);
            }
            _ = tokio::time::sleep_until(finalize_at.unwrap_or_else(Instant::now)), if finalize_at.is_some() => {
                if finalize(&shared) {
                    info!("Loading finished, handing over to the main interface");
                }
                break;
            }
            else => break,
        }
    }
}

fn retarget(
    status: &LoadStatus,
    target: &mut f64,
    chasing: &mut bool,
    finalize_at: &mut Option<Instant>,
    settings: &PresenterSettings,
) {
    // Targets never move backwards
    let next = estimator::presenter_target(status).max(*target);
    if next != *target {
        debug!(
            "Loading progress target {:.1}% ({}/{})",
            next * 100.0,
            status.loaded,
            status.total
        );
        *target = next;
        *chasing = true;
    }

    if status.is_done() && finalize_at.is_none() {
        debug!("All resources settled, finalizing in {:?}", settings.finalize_grace);
        *finalize_at = Some(Instant::now() + settings.finalize_grace);
    }
}
