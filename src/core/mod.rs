pub mod etl;

pub use crate::domain::model::{Package, PackageResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use etl::AnalysisEngine;
