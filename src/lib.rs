pub mod cli;
pub mod config;
pub mod error;
pub mod site;
pub mod startup;

pub use config::LoaderConfig;
pub use error::{LoadError, LoadResult};
pub use startup::{LoadingSession, ResourceLoader};
