pub mod estimator;
pub mod fetch;
pub mod loader;
pub mod presenter;
pub mod readiness;
pub mod registry;
pub mod resource;
pub mod session;
pub mod strategy;
pub mod watchdog;

pub use fetch::AssetFetcher;
pub use loader::ResourceLoader;
pub use presenter::{PresenterSettings, PresenterView, ProgressPresenter};
pub use readiness::{ReadinessHandle, ReadinessSignal};
pub use registry::{LoadStatus, ResourceRegistry};
pub use resource::{Resource, ResourceKind, ResourceStatus};
pub use session::{LoadingSession, SessionReport};
pub use strategy::{LoadOutcome, LoadStrategy, StrategyDispatcher};
pub use watchdog::{Watchdog, WatchdogOutcome};
