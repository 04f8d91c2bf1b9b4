//! CycloneDX and SPDX (JSON) SBOM reading.

use crate::domain::model::null_as_default;
use crate::utils::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Package extracted from an SBOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomPackage {
    pub name: String,
    pub version: Option<String>,
    pub ecosystem: String,
    pub purl: Option<String>,
}

/// A parsed `pkg:type/namespace/name@version?qualifiers#subpath` package URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUrl {
    pub purl_type: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

impl PackageUrl {
    pub fn parse(purl: &str) -> Option<Self> {
        let rest = purl.trim().strip_prefix("pkg:")?;
        let rest = rest.trim_start_matches('/');
        let rest = rest.split_once('#').map_or(rest, |(head, _)| head);
        let rest = rest.split_once('?').map_or(rest, |(head, _)| head);

        let (path, version) = match rest.rsplit_once('@') {
            Some((path, version)) if !version.contains('/') => {
                (path, Some(decode(version)).filter(|v| !v.is_empty()))
            }
            _ => (rest, None),
        };

        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return None;
        }

        let purl_type = segments.remove(0).to_lowercase();
        let name = decode(segments.pop()?);
        if name.is_empty() {
            return None;
        }

        let mut namespace = (!segments.is_empty())
            .then(|| segments.iter().map(|s| decode(s)).collect::<Vec<_>>().join("/"));

        // pypi names are case- and separator-insensitive; github and bitbucket are case-insensitive
        let name = match purl_type.as_str() {
            "pypi" => name.to_lowercase().replace('_', "-"),
            "github" | "bitbucket" => {
                namespace = namespace.map(|ns| ns.to_lowercase());
                name.to_lowercase()
            }
            _ => name,
        };

        Some(Self {
            purl_type,
            namespace,
            name,
            version,
        })
    }

    /// `namespace/name`, or just `name`.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// `pkg:type/namespace/name@version` with normalized parts. Qualifiers
    /// and subpath are dropped since they name an artifact, not a package.
    pub fn to_canonical(&self) -> String {
        let mut purl = format!("pkg:{}/", self.purl_type);
        if let Some(ns) = &self.namespace {
            for segment in ns.split('/') {
                purl.push_str(&urlencoding::encode(segment));
                purl.push('/');
            }
        }
        purl.push_str(&urlencoding::encode(&self.name));
        if let Some(version) = &self.version {
            purl.push('@');
            purl.push_str(&urlencoding::encode(version));
        }
        purl
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Map a purl type to the ecosyste.ms registry name.
pub fn purl_type_to_ecosystem(purl_type: &str) -> String {
    let lower = purl_type.to_lowercase();
    let registry = match lower.as_str() {
        "npm" => "npmjs.org",
        "pypi" => "pypi.org",
        "gem" => "rubygems.org",
        "cargo" => "crates.io",
        "nuget" => "nuget.org",
        "maven" => "repo1.maven.org",
        "golang" => "proxy.golang.org",
        "composer" => "packagist.org",
        "cocoapods" => "cocoapods.org",
        "hex" => "hex.pm",
        "pub" => "pub.dev",
        _ => return purl_type.to_string(),
    };
    registry.to_string()
}

#[derive(Debug, Deserialize)]
struct CycloneDxComponent {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    purl: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    components: Vec<CycloneDxComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxPackage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version_info: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    external_refs: Vec<SpdxExternalRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxExternalRef {
    #[serde(default)]
    reference_type: Option<String>,
    #[serde(default)]
    reference_locator: Option<String>,
}

/// Parse a CycloneDX or SPDX JSON document into packages.
pub fn parse_sbom(bytes: &[u8]) -> Result<Vec<SbomPackage>> {
    let doc: Value = serde_json::from_slice(bytes).map_err(|e| AnalyzerError::Sbom {
        message: format!("SBOM is not valid JSON: {}", e),
    })?;

    let raw = if doc.get("spdxVersion").is_some() {
        spdx_entries(&doc)?
    } else if doc.get("bomFormat").and_then(Value::as_str) == Some("CycloneDX")
        || doc.get("components").is_some_and(Value::is_array)
    {
        cyclonedx_entries(&doc)?
    } else {
        return Err(AnalyzerError::Sbom {
            message: "Unrecognized SBOM format (expected CycloneDX or SPDX JSON)".to_string(),
        });
    };

    Ok(raw
        .into_iter()
        .filter(|(name, _, _)| !name.is_empty())
        .map(|(name, version, purl)| to_package(name, version, purl))
        .collect())
}

type RawEntry = (String, Option<String>, Option<String>);

fn cyclonedx_entries(doc: &Value) -> Result<Vec<RawEntry>> {
    let components: Vec<CycloneDxComponent> = match doc.get("components") {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
        _ => Vec::new(),
    };

    let mut entries = Vec::new();
    let mut stack: Vec<CycloneDxComponent> = components.into_iter().rev().collect();
    while let Some(component) = stack.pop() {
        stack.extend(component.components.into_iter().rev());
        entries.push((
            component.name.unwrap_or_default(),
            component.version,
            component.purl,
        ));
    }
    Ok(entries)
}

fn spdx_entries(doc: &Value) -> Result<Vec<RawEntry>> {
    let packages: Vec<SpdxPackage> = match doc.get("packages") {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
        _ => Vec::new(),
    };

    Ok(packages
        .into_iter()
        .map(|pkg| {
            let purl = pkg
                .external_refs
                .into_iter()
                .find(|r| r.reference_type.as_deref() == Some("purl"))
                .and_then(|r| r.reference_locator);
            (pkg.name.unwrap_or_default(), pkg.version_info, purl)
        })
        .collect())
}

fn to_package(name: String, version: Option<String>, purl: Option<String>) -> SbomPackage {
    let parsed = purl.as_deref().and_then(PackageUrl::parse);

    match parsed {
        Some(p) => SbomPackage {
            name: p.qualified_name(),
            version,
            ecosystem: purl_type_to_ecosystem(&p.purl_type),
            purl: Some(p.to_canonical()),
        },
        None => SbomPackage {
            name,
            version,
            ecosystem: "unknown".to_string(),
            purl,
        },
    }
}
