//! Client for the ecosyste.ms family of APIs (packages, sponsors, repos,
//! commits, issues).

use crate::adapters::http::ApiClient;
use crate::domain::model::{
    null_as_default, Committer, IssueContributors, Package, PackageInfo, SponsorshipData,
};
use crate::domain::ports::{ContributionSource, EndpointConfig, PackageRegistry, SponsorSource};
use crate::utils::error::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;

const PER_PAGE: u32 = 100;
const SPONSOR_MAX_PAGES: u32 = 10;
pub const CRITICAL_MAX_PAGES: u32 = 50;

static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[/@.])github\.com[/:]([^/\s]+)/([^/#?\s]+)")
        .expect("github url pattern compiles")
});

/// Extract `(owner, repo)` from any common GitHub repository URL form.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let caps = GITHUB_URL.captures(url)?;
    let owner = caps.get(1)?.as_str();
    let repo = caps.get(2)?.as_str();
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[derive(Debug, Deserialize)]
struct CriticalPackage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ecosystem: Option<String>,
    #[serde(default)]
    repository_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    dependent_repos_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct OwnerRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    maintainers: Vec<MaintainerCount>,
}

#[derive(Debug, Deserialize)]
struct MaintainerCount {
    #[serde(default)]
    maintainer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountRef {
    #[serde(default)]
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SponsorshipRecord {
    #[serde(default)]
    maintainer: Option<AccountRef>,
    #[serde(default)]
    funder: Option<AccountRef>,
    #[serde(default)]
    status: Option<String>,
}

impl SponsorshipRecord {
    fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryRecord {
    #[serde(default)]
    metadata: Option<RepositoryMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryMetadata {
    #[serde(default)]
    funding: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CommitsRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    committers: Vec<Committer>,
    #[serde(default, deserialize_with = "null_as_default")]
    past_year_committers: Vec<Committer>,
}

/// Which side of a sponsorship record names the account we want.
#[derive(Debug, Clone, Copy)]
enum SponsorSide {
    Maintainer,
    Funder,
}

pub struct EcosystemsClient {
    api: ApiClient,
    endpoints: EndpointConfig,
}

impl EcosystemsClient {
    pub fn new(api: ApiClient, endpoints: EndpointConfig) -> Self {
        Self { api, endpoints }
    }

    pub fn request_count(&self) -> u64 {
        self.api.request_count()
    }

    fn repository_path(base: &str, owner: &str, repo: &str) -> String {
        format!(
            "{}/hosts/GitHub/repositories/{}/{}",
            base.trim_end_matches('/'),
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        )
    }

    async fn sponsorship_list(&self, url: String, side: SponsorSide) -> Result<SponsorshipData> {
        let records: Vec<SponsorshipRecord> = self
            .api
            .paginate(&url, &[], PER_PAGE, SPONSOR_MAX_PAGES)
            .await?;

        let mut data = SponsorshipData::default();
        for record in &records {
            let account = match side {
                SponsorSide::Maintainer => record.maintainer.as_ref(),
                SponsorSide::Funder => record.funder.as_ref(),
            };
            if let Some(login) = account.and_then(|a| a.login.as_deref()).filter(|l| !l.is_empty()) {
                data.record(login, record.is_active());
            }
        }
        Ok(data)
    }
}

#[async_trait]
impl PackageRegistry for EcosystemsClient {
    async fn critical_packages(&self, max_pages: u32) -> Result<Vec<Package>> {
        let url = format!("{}/packages/critical", self.endpoints.packages_url.trim_end_matches('/'));
        let mut packages = Vec::new();

        for page in 1..=max_pages {
            let params = [
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let batch = match self.api.get_json::<Vec<CriticalPackage>>(&url, &params).await {
                Ok(Some(batch)) if !batch.is_empty() => batch,
                Ok(_) => break,
                Err(e) => {
                    tracing::warn!("Error fetching critical packages page {}: {}", page, e);
                    break;
                }
            };

            let fetched = batch.len();
            for pkg in batch {
                let Some(repo_url) = pkg.repository_url.filter(|u| u.contains("github.com")) else {
                    continue;
                };
                let Some((owner, repo)) = parse_github_url(&repo_url) else {
                    continue;
                };
                packages.push(Package {
                    name: pkg.name.unwrap_or_default(),
                    ecosystem: pkg.ecosystem.unwrap_or_default(),
                    owner,
                    repo,
                    dependents_count: pkg.dependent_repos_count,
                    repository_url: repo_url,
                });
            }

            tracing::info!(
                "  Page {}: {} packages ({} GitHub repos so far)",
                page,
                fetched,
                packages.len()
            );
        }

        tracing::info!("Total critical packages found on GitHub: {}", packages.len());
        Ok(packages)
    }

    async fn lookup_purl(&self, purl: &str) -> Result<Option<PackageInfo>> {
        let url = format!("{}/packages/lookup", self.endpoints.packages_url.trim_end_matches('/'));
        let hits: Option<Vec<PackageInfo>> = self
            .api
            .get_json(&url, &[("purl", purl.to_string())])
            .await?;
        Ok(hits.and_then(|h| h.into_iter().next()))
    }

    async fn org_maintainers(&self, org: &str) -> Result<HashSet<String>> {
        let url = format!(
            "{}/hosts/GitHub/owners/{}",
            self.endpoints.issues_url.trim_end_matches('/'),
            urlencoding::encode(org)
        );
        let record: OwnerRecord = self.api.get_json(&url, &[]).await?.unwrap_or_default();

        Ok(record
            .maintainers
            .into_iter()
            .filter_map(|m| m.maintainer)
            .filter(|m| !m.is_empty())
            .map(|m| m.to_lowercase())
            .collect())
    }
}

#[async_trait]
impl SponsorSource for EcosystemsClient {
    async fn account_sponsorships(&self, login: &str) -> Result<SponsorshipData> {
        let url = format!(
            "{}/accounts/{}/sponsorships",
            self.endpoints.sponsors_url.trim_end_matches('/'),
            urlencoding::encode(login)
        );
        self.sponsorship_list(url, SponsorSide::Maintainer).await
    }

    async fn account_sponsors(&self, login: &str) -> Result<SponsorshipData> {
        let url = format!(
            "{}/accounts/{}/sponsors",
            self.endpoints.sponsors_url.trim_end_matches('/'),
            urlencoding::encode(login)
        );
        self.sponsorship_list(url, SponsorSide::Funder).await
    }

    async fn repo_funding(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        let url = Self::repository_path(&self.endpoints.repos_url, owner, repo);
        let record: RepositoryRecord = self.api.get_json(&url, &[]).await?.unwrap_or_default();

        let github = record
            .metadata
            .and_then(|m| m.funding)
            .and_then(|f| f.get("github").cloned());

        Ok(match github {
            Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s],
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        })
    }
}

#[async_trait]
impl ContributionSource for EcosystemsClient {
    async fn repo_committers(
        &self,
        owner: &str,
        repo: &str,
        past_year: bool,
    ) -> Result<Vec<Committer>> {
        let url = Self::repository_path(&self.endpoints.commits_url, owner, repo);
        let record: CommitsRecord = self.api.get_json(&url, &[]).await?.unwrap_or_default();

        Ok(if past_year {
            record.past_year_committers
        } else {
            record.committers
        })
    }

    async fn repo_issue_contributors(&self, owner: &str, repo: &str) -> Result<IssueContributors> {
        let url = Self::repository_path(&self.endpoints.issues_url, owner, repo);
        Ok(self.api.get_json(&url, &[]).await?.unwrap_or_default())
    }
}
