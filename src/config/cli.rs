use crate::domain::ports::{ConfigProvider, EndpointConfig};
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, Validate};
use clap::Parser;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Parser)]
#[command(name = "oss-engagement")]
#[command(about = "Measure an organization's code and sponsorship engagement with the open source packages it depends on")]
#[command(version)]
pub struct CliConfig {
    /// GitHub organization login (e.g. "stripe")
    #[arg(long)]
    pub org: String,

    /// Email domain used to attribute commits (e.g. "stripe.com")
    #[arg(long)]
    pub email_domain: String,

    /// Time window in years; 1 uses past-year data, anything larger uses all-time data
    #[arg(long, default_value = "1")]
    pub years: u32,

    #[arg(long, default_value = "results.json")]
    pub output: String,

    /// Output formats: json, csv
    #[arg(long, value_delimiter = ',', default_value = "json")]
    pub formats: Vec<String>,

    /// Only analyze the first N packages
    #[arg(long)]
    pub max_packages: Option<usize>,

    /// JSON file listing packages to analyze instead of the critical feed
    #[arg(long, conflicts_with = "sbom")]
    pub packages_file: Option<String>,

    /// CycloneDX or SPDX JSON SBOM to take packages from
    #[arg(long)]
    pub sbom: Option<String>,

    /// Pause between packages, in milliseconds
    #[arg(long, default_value = "500")]
    pub request_delay_ms: u64,

    #[serde(skip_serializing)]
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Log memory usage per phase")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn org_name(&self) -> &str {
        &self.org
    }

    fn email_domain(&self) -> &str {
        &self.email_domain
    }

    fn time_window_years(&self) -> u32 {
        self.years
    }

    fn output_file(&self) -> &str {
        &self.output
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn max_packages(&self) -> Option<usize> {
        self.max_packages
    }

    fn packages_file(&self) -> Option<&str> {
        self.packages_file.as_deref()
    }

    fn sbom_file(&self) -> Option<&str> {
        self.sbom.as_deref()
    }

    fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref().filter(|t| !t.is_empty())
    }

    fn endpoints(&self) -> EndpointConfig {
        EndpointConfig::default()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        super::validate_analysis_settings(self)?;
        validate_path("output", &self.output)
    }
}
