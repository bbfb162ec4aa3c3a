//! Readiness signals shared between the loader and its collaborators
//!
//! The rendering engine (and the platform font system) own a
//! [`ReadinessHandle`] and flip it once their work is done; strategies hold
//! [`ReadinessSignal`]s and wait on them instead of re-reading ambient flags.
//! Collaborators that can only expose a shared boolean are supported through
//! [`ReadinessSignal::from_flag`], which falls back to fixed-interval polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{LoadError, LoadResult};

/// Owner side of a readiness signal.
#[derive(Debug)]
pub struct ReadinessHandle {
    sender: watch::Sender<bool>,
}

/// Waiting side of a readiness signal.
#[derive(Debug, Clone)]
pub enum ReadinessSignal {
    Channel(watch::Receiver<bool>),
    /// Polling fallback over a shared flag
    Flag {
        flag: Arc<AtomicBool>,
        interval: Duration,
    },
}

impl ReadinessHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn signal(&self) -> ReadinessSignal {
        ReadinessSignal::Channel(self.sender.subscribe())
    }

    pub fn mark_ready(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for ReadinessHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessSignal {
    pub fn from_flag(flag: Arc<AtomicBool>, interval: Duration) -> Self {
        ReadinessSignal::Flag { flag, interval }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            ReadinessSignal::Channel(receiver) => *receiver.borrow(),
            ReadinessSignal::Flag { flag, .. } => flag.load(Ordering::Acquire),
        }
    }

    /// Wait until the owner reports ready.
    ///
    /// Fails only when the owning handle is dropped without ever becoming ready.
    pub async fn wait(&self) -> LoadResult<()> {
        match self {
            ReadinessSignal::Channel(receiver) => {
                let mut receiver = receiver.clone();
                receiver
                    .wait_for(|ready| *ready)
                    .await
                    .map(|_| ())
                    .map_err(|_| LoadError::transport("", "readiness signal owner dropped"))
            }
            ReadinessSignal::Flag { flag, interval } => {
                while !flag.load(Ordering::Acquire) {
                    tokio::time::sleep(*interval).await;
                }
                Ok(())
            }
        }
    }
}
