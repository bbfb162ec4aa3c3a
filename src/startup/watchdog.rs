use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::startup::presenter::ProgressPresenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// The presenter finalized on its own before the ceiling
    Natural,
    /// The ceiling elapsed and finalize was forced
    Forced { after: Duration },
    /// Cancelled by the owner
    Disarmed,
}

/// Forces the presenter to finalize if loading outlives the ceiling.
///
/// Only the loading screen is unblocked; in-flight loads keep running.
pub struct Watchdog {
    handle: JoinHandle<WatchdogOutcome>,
}

impl Watchdog {
    pub fn arm(presenter: ProgressPresenter, ceiling: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let armed_at = Instant::now();
            tokio::select! {
                _ = presenter.wait_ready() => {
                    debug!("Loading finished in {:?}, watchdog cancelled", armed_at.elapsed());
                    WatchdogOutcome::Natural
                }
                _ = tokio::time::sleep(ceiling) => {
                    if presenter.force_finalize() {
                        warn!("{}, forcing completion", LoadError::timeout(ceiling));
                        WatchdogOutcome::Forced { after: armed_at.elapsed() }
                    } else {
                        WatchdogOutcome::Natural
                    }
                }
            }
        });

        Self { handle }
    }

    pub fn disarm(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn outcome(self) -> WatchdogOutcome {
        self.handle.await.unwrap_or(WatchdogOutcome::Disarmed)
    }
}
