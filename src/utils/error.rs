use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned HTTP {status} for {url}")]
    ApiStatus { url: String, status: u16 },

    #[error(
        "Giving up on {url} after {attempts} attempts (last status: {}){}",
        .last_status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
        .last_error.as_ref().map(|e| format!(": {}", e)).unwrap_or_default()
    )]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
        last_error: Option<String>,
    },

    #[error("GraphQL query failed: {message}")]
    GraphQl { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("SBOM error: {message}")]
    Sbom { message: String },

    #[error("Package list error: {message}")]
    PackageList { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
    Config,
    Input,
    Output,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl AnalyzerError {
    /// Transient failures may succeed on a later run; permanent ones will not.
    pub fn is_transient(&self) -> bool {
        match self {
            AnalyzerError::RetriesExhausted { .. } => true,
            AnalyzerError::Http(e) => e.is_timeout() || e.is_connect(),
            AnalyzerError::ApiStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalyzerError::Http(_) | AnalyzerError::RetriesExhausted { .. } => {
                ErrorCategory::Network
            }
            AnalyzerError::ApiStatus { .. } | AnalyzerError::GraphQl { .. } => ErrorCategory::Api,
            AnalyzerError::Config { .. }
            | AnalyzerError::InvalidConfigValue { .. }
            | AnalyzerError::MissingConfig { .. } => ErrorCategory::Config,
            AnalyzerError::Sbom { .. } | AnalyzerError::PackageList { .. } => ErrorCategory::Input,
            AnalyzerError::Io(_) | AnalyzerError::Csv(_) => ErrorCategory::Output,
            AnalyzerError::Serialization(_) | AnalyzerError::Processing { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Api if self.is_transient() => ErrorSeverity::Medium,
            ErrorCategory::Api | ErrorCategory::Input | ErrorCategory::Processing => {
                ErrorSeverity::High
            }
            ErrorCategory::Config | ErrorCategory::Output => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AnalyzerError::Http(_) | AnalyzerError::RetriesExhausted { .. } => {
                "Check network connectivity and API rate limits, then re-run the analysis"
            }
            AnalyzerError::ApiStatus { status, .. } if *status == 401 || *status == 403 => {
                "Check that GITHUB_TOKEN is valid and has read:org scope"
            }
            AnalyzerError::ApiStatus { .. } => {
                "The upstream API rejected the request; verify the organization and package names"
            }
            AnalyzerError::GraphQl { .. } => {
                "Verify the organization exists and the token can read sponsorship data"
            }
            AnalyzerError::Config { .. }
            | AnalyzerError::InvalidConfigValue { .. }
            | AnalyzerError::MissingConfig { .. } => {
                "Review the command-line flags or TOML configuration file"
            }
            AnalyzerError::Sbom { .. } => {
                "Provide a CycloneDX or SPDX document in JSON format"
            }
            AnalyzerError::PackageList { .. } => {
                "Provide a JSON array of packages or an object with a 'packages' array"
            }
            AnalyzerError::Io(_) | AnalyzerError::Csv(_) => {
                "Check that the output path exists and is writable"
            }
            AnalyzerError::Serialization(_) | AnalyzerError::Processing { .. } => {
                "Re-run with --verbose to see which input caused the failure"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach an upstream API: {}", self),
            ErrorCategory::Api => format!("An upstream API returned an error: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Could not read the package list: {}", self),
            ErrorCategory::Output => format!("Could not write the report: {}", self),
            ErrorCategory::Processing => format!("Analysis failed: {}", self),
        }
    }
}
