pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::TomlConfig;

pub use crate::adapters::{BackendSettings, FileRegionSource, GridZonalStatistics, HttpRasterBackend, LocalStorage};
pub use crate::core::orchestrator::{Orchestrator, RunOptions};
pub use crate::utils::error::{Result, SeriesError};
