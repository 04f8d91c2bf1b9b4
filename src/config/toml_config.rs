use crate::domain::ports::{ConfigProvider, EndpointConfig};
use crate::utils::error::{AnalyzerError, Result};
use crate::utils::validation::{validate_path, validate_required_field, Validate};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern compiles"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub org: Option<String>,
    pub email_domain: Option<String>,
    #[serde(default = "default_years")]
    pub years: u32,
    pub max_packages: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    pub packages_file: Option<String>,
    pub sbom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            formats: default_formats(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
    pub packages_url: Option<String>,
    pub sponsors_url: Option<String>,
    pub repos_url: Option<String>,
    pub commits_url: Option<String>,
    pub issues_url: Option<String>,
    pub github_api_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            github_token: None,
            packages_url: None,
            sponsors_url: None,
            repos_url: None,
            commits_url: None,
            issues_url: None,
            github_api_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub verbose: Option<bool>,
    pub json_logs: Option<bool>,
}

fn default_years() -> u32 {
    1
}

fn default_output_path() -> String {
    "results.json".to_string()
}

fn default_formats() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_request_delay_ms() -> u64 {
    500
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| AnalyzerError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the variable's value. Unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().is_some_and(|m| m.enabled)
    }

    pub fn verbose(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.verbose)
            .unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_required_field("analysis.org", &self.analysis.org)?;
        validate_required_field("analysis.email_domain", &self.analysis.email_domain)?;
        super::validate_analysis_settings(self)?;
        validate_path("output.path", &self.output.path)
    }
}

impl ConfigProvider for TomlConfig {
    fn org_name(&self) -> &str {
        self.analysis.org.as_deref().unwrap_or_default()
    }

    fn email_domain(&self) -> &str {
        self.analysis.email_domain.as_deref().unwrap_or_default()
    }

    fn time_window_years(&self) -> u32 {
        self.analysis.years
    }

    fn output_file(&self) -> &str {
        &self.output.path
    }

    fn output_formats(&self) -> &[String] {
        &self.output.formats
    }

    fn max_packages(&self) -> Option<usize> {
        self.analysis.max_packages
    }

    fn packages_file(&self) -> Option<&str> {
        self.input.packages_file.as_deref()
    }

    fn sbom_file(&self) -> Option<&str> {
        self.input.sbom.as_deref()
    }

    fn request_delay(&self) -> Duration {
        Duration::from_millis(self.api.request_delay_ms)
    }

    /// An unresolved `${VAR}` placeholder counts as no token.
    fn github_token(&self) -> Option<&str> {
        self.api
            .github_token
            .as_deref()
            .filter(|t| !t.is_empty() && !t.starts_with("${"))
    }

    fn endpoints(&self) -> EndpointConfig {
        let defaults = EndpointConfig::default();
        let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);

        EndpointConfig {
            packages_url: pick(&self.api.packages_url, defaults.packages_url),
            sponsors_url: pick(&self.api.sponsors_url, defaults.sponsors_url),
            repos_url: pick(&self.api.repos_url, defaults.repos_url),
            commits_url: pick(&self.api.commits_url, defaults.commits_url),
            issues_url: pick(&self.api.issues_url, defaults.issues_url),
            github_api_url: pick(&self.api.github_api_url, defaults.github_api_url),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
