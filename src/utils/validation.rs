use crate::utils::error::{AnalyzerError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub const SUPPORTED_FORMATS: [&str; 2] = ["json", "csv"];

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> AnalyzerError {
    AnalyzerError::InvalidConfigValue {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(field_name, url_str, format!("Invalid URL format: {}", e))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_file_extensions(
    field_name: &str,
    files: &[String],
    allowed_extensions: &[&str],
) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    for file in files {
        match std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(extension) if allowed_set.contains(extension) => {}
            Some(extension) => {
                return Err(invalid(
                    field_name,
                    file,
                    format!(
                        "Unsupported file extension: {}. Allowed extensions: {}",
                        extension,
                        allowed_extensions.join(", ")
                    ),
                ));
            }
            None => {
                return Err(invalid(
                    field_name,
                    file,
                    "File has no extension or invalid filename",
                ));
            }
        }
    }

    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| AnalyzerError::MissingConfig {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

/// A bare domain such as `example.com`; the `@` is added during matching.
pub fn validate_email_domain(field_name: &str, domain: &str) -> Result<()> {
    validate_non_empty_string(field_name, domain)?;
    if domain.contains('@') {
        return Err(invalid(
            field_name,
            domain,
            "Use the bare domain (e.g. example.com), without '@'",
        ));
    }
    if !domain.contains('.') || domain.chars().any(char::is_whitespace) {
        return Err(invalid(field_name, domain, "Not a valid email domain"));
    }
    Ok(())
}

pub fn validate_output_formats(field_name: &str, formats: &[String]) -> Result<()> {
    if formats.is_empty() {
        return Err(invalid(field_name, "", "At least one output format is required"));
    }
    for format in formats {
        if !SUPPORTED_FORMATS.contains(&format.as_str()) {
            return Err(invalid(
                field_name,
                format,
                format!(
                    "Unsupported format. Valid formats: {}",
                    SUPPORTED_FORMATS.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api.github_url", "https://api.github.com").is_ok());
        assert!(validate_url("api.github_url", "http://localhost:8080").is_ok());
        assert!(validate_url("api.github_url", "").is_err());
        assert!(validate_url("api.github_url", "invalid-url").is_err());
        assert!(validate_url("api.github_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("analysis.years", 1, 1).is_ok());
        assert!(validate_positive_number("analysis.years", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extensions() {
        let files = vec!["packages.json".to_string(), "bom.cdx.json".to_string()];
        assert!(validate_file_extensions("input", &files, &["json"]).is_ok());

        let invalid_files = vec!["packages.yaml".to_string()];
        assert!(validate_file_extensions("input", &invalid_files, &["json"]).is_err());
    }

    #[test]
    fn test_validate_email_domain() {
        assert!(validate_email_domain("analysis.email_domain", "example.com").is_ok());
        assert!(validate_email_domain("analysis.email_domain", "@example.com").is_err());
        assert!(validate_email_domain("analysis.email_domain", "  ").is_err());
        assert!(validate_email_domain("analysis.email_domain", "localhost").is_err());
    }

    #[test]
    fn test_validate_output_formats() {
        let ok = vec!["json".to_string(), "csv".to_string()];
        assert!(validate_output_formats("output.formats", &ok).is_ok());

        let bad = vec!["xml".to_string()];
        assert!(validate_output_formats("output.formats", &bad).is_err());
        assert!(validate_output_formats("output.formats", &[]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("analysis.years", 5u32, 1, 50).is_ok());
        assert!(validate_range("analysis.years", 0u32, 1, 50).is_err());
    }
}
