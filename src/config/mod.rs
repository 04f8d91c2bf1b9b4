#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::TomlConfig;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::{AnalyzerError, Result};
use crate::utils::validation::{
    validate_email_domain, validate_file_extensions, validate_non_empty_string,
    validate_output_formats, validate_positive_number, validate_range, validate_url,
};

const MAX_REQUEST_DELAY_MS: u128 = 60_000;

/// Checks shared by every configuration source.
pub fn validate_analysis_settings<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_non_empty_string("org", config.org_name())?;
    validate_email_domain("email_domain", config.email_domain())?;
    validate_positive_number("years", config.time_window_years() as usize, 1)?;
    validate_output_formats("formats", config.output_formats())?;
    validate_range(
        "request_delay_ms",
        config.request_delay().as_millis(),
        0,
        MAX_REQUEST_DELAY_MS,
    )?;

    if let Some(max) = config.max_packages() {
        validate_positive_number("max_packages", max, 1)?;
    }

    if config.packages_file().is_some() && config.sbom_file().is_some() {
        return Err(AnalyzerError::Config {
            message: "packages_file and sbom are mutually exclusive".to_string(),
        });
    }
    if let Some(path) = config.packages_file() {
        validate_file_extensions("packages_file", &[path.to_string()], &["json"])?;
    }
    if let Some(path) = config.sbom_file() {
        validate_file_extensions("sbom", &[path.to_string()], &["json"])?;
    }

    let endpoints = config.endpoints();
    for (field, url) in [
        ("api.packages_url", &endpoints.packages_url),
        ("api.sponsors_url", &endpoints.sponsors_url),
        ("api.repos_url", &endpoints.repos_url),
        ("api.commits_url", &endpoints.commits_url),
        ("api.issues_url", &endpoints.issues_url),
        ("api.github_api_url", &endpoints.github_api_url),
    ] {
        validate_url(field, url)?;
    }

    Ok(())
}
