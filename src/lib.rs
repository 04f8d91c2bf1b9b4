pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::{EcosystemsClient, GitHubClient, LocalStorage};
pub use app::EngagementPipeline;
pub use core::AnalysisEngine;
pub use domain::model::{EngagementTier, Package, PackageResult, SponsorshipKind, SponsorshipStatus};
pub use utils::error::{AnalyzerError, Result};
