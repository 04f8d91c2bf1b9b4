//! Candidate package list resolution from a package file or an SBOM.

use crate::adapters::ecosystems::parse_github_url;
use crate::app::sbom::SbomPackage;
use crate::domain::model::{null_as_default, Package};
use crate::domain::ports::PackageRegistry;
use crate::utils::error::{AnalyzerError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PackageFile {
    List(Vec<PackageEntry>),
    Wrapped { packages: Vec<PackageEntry> },
}

#[derive(Debug, Default, Deserialize)]
struct PackageEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ecosystem: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    repository_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    dependents_count: u64,
}

/// Parse a JSON package list: either a bare array or `{"packages": [...]}`.
pub fn parse_packages_file(bytes: &[u8]) -> Result<Vec<Package>> {
    let file: PackageFile = serde_json::from_slice(bytes).map_err(|e| AnalyzerError::PackageList {
        message: format!("expected a JSON array or an object with a \"packages\" array: {}", e),
    })?;

    let entries = match file {
        PackageFile::List(entries) | PackageFile::Wrapped { packages: entries } => entries,
    };

    let mut packages = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let (owner, repo, repository_url) = match entry.repository_url.filter(|u| !u.is_empty()) {
            Some(url) => match parse_github_url(&url) {
                Some((owner, repo)) => (owner, repo, url),
                None => {
                    tracing::warn!("Skipping entry {}: not a GitHub URL: {}", index, url);
                    continue;
                }
            },
            None => match (entry.owner, entry.repo) {
                (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                    let url = format!("https://github.com/{}/{}", owner, repo);
                    (owner, repo, url)
                }
                _ => {
                    tracing::warn!("Skipping entry {}: needs repository_url or owner and repo", index);
                    continue;
                }
            },
        };

        packages.push(Package {
            name: entry.name.unwrap_or_else(|| repo.clone()),
            ecosystem: entry.ecosystem.unwrap_or_else(|| "unknown".to_string()),
            owner,
            repo,
            dependents_count: entry.dependents_count,
            repository_url,
        });
    }

    Ok(packages)
}

/// Look up each SBOM entry's purl and keep those hosted on GitHub.
pub async fn resolve_sbom_packages<R>(registry: &R, sbom: &[SbomPackage]) -> Result<Vec<Package>>
where
    R: PackageRegistry + ?Sized,
{
    let mut packages = Vec::new();
    let mut skipped = 0usize;

    for entry in sbom {
        let Some(purl) = entry.purl.as_deref() else {
            skipped += 1;
            continue;
        };

        let info = match registry.lookup_purl(purl).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Lookup failed for {}: {}", purl, e);
                skipped += 1;
                continue;
            }
        };

        let github = info
            .repository_url
            .as_deref()
            .filter(|u| u.contains("github.com"))
            .and_then(|u| parse_github_url(u).map(|parsed| (parsed, u.to_string())));

        match github {
            Some(((owner, repo), repository_url)) => packages.push(Package {
                name: entry.name.clone(),
                ecosystem: info.ecosystem.unwrap_or_else(|| entry.ecosystem.clone()),
                owner,
                repo,
                dependents_count: info.dependent_repos_count,
                repository_url,
            }),
            None => skipped += 1,
        }
    }

    tracing::info!(
        "📦 Resolved {} GitHub packages from SBOM ({} skipped)",
        packages.len(),
        skipped
    );
    Ok(packages)
}

/// Keep the first `max` packages when a limit is set.
pub fn apply_limit(mut packages: Vec<Package>, max: Option<usize>) -> Vec<Package> {
    if let Some(max) = max {
        if packages.len() > max {
            tracing::info!("Limiting analysis to the first {} of {} packages", max, packages.len());
            packages.truncate(max);
        }
    }
    packages
}
