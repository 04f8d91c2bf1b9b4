// Application layer: package resolution, report building and the analysis pipeline.

pub mod packages;
pub mod pipeline;
pub mod report;
pub mod sbom;

pub use pipeline::EngagementPipeline;
pub use report::{generate_report, print_summary, AnalysisReport};
