use crate::domain::model::{
    Committer, IssueContributors, Package, PackageInfo, PackageResult, SponsorshipData,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Base URLs for every upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub packages_url: String,
    pub sponsors_url: String,
    pub repos_url: String,
    pub commits_url: String,
    pub issues_url: String,
    pub github_api_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            packages_url: "https://packages.ecosyste.ms/api/v1".to_string(),
            sponsors_url: "https://sponsors.ecosyste.ms/api/v1".to_string(),
            repos_url: "https://repos.ecosyste.ms/api/v1".to_string(),
            commits_url: "https://commits.ecosyste.ms/api/v1".to_string(),
            issues_url: "https://issues.ecosyste.ms/api/v1".to_string(),
            github_api_url: "https://api.github.com".to_string(),
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn org_name(&self) -> &str;
    fn email_domain(&self) -> &str;
    fn time_window_years(&self) -> u32;
    fn output_file(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn max_packages(&self) -> Option<usize>;
    fn packages_file(&self) -> Option<&str>;
    fn sbom_file(&self) -> Option<&str>;
    fn request_delay(&self) -> Duration;
    fn github_token(&self) -> Option<&str>;
    fn endpoints(&self) -> EndpointConfig;

    /// One year means the past-year window; anything longer means all time.
    fn past_year_only(&self) -> bool {
        self.time_window_years() == 1
    }
}

/// Where contribution counts for a repository come from.
#[async_trait]
pub trait ContributionSource: Send + Sync {
    async fn repo_committers(
        &self,
        owner: &str,
        repo: &str,
        past_year: bool,
    ) -> Result<Vec<Committer>>;
    async fn repo_issue_contributors(&self, owner: &str, repo: &str) -> Result<IssueContributors>;
}

/// Where sponsorship relations come from.
#[async_trait]
pub trait SponsorSource: Send + Sync {
    /// Accounts that `login` sponsors.
    async fn account_sponsorships(&self, login: &str) -> Result<SponsorshipData>;
    /// Accounts that sponsor `login`.
    async fn account_sponsors(&self, login: &str) -> Result<SponsorshipData>;
    /// GitHub Sponsors targets listed in the repository's funding file.
    async fn repo_funding(&self, owner: &str, repo: &str) -> Result<Vec<String>>;
}

/// Package discovery and org-level lookups.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn critical_packages(&self, max_pages: u32) -> Result<Vec<Package>>;
    async fn lookup_purl(&self, purl: &str) -> Result<Option<PackageInfo>>;
    async fn org_maintainers(&self, org: &str) -> Result<HashSet<String>>;
}

#[async_trait]
impl<T: ContributionSource + ?Sized> ContributionSource for Arc<T> {
    async fn repo_committers(
        &self,
        owner: &str,
        repo: &str,
        past_year: bool,
    ) -> Result<Vec<Committer>> {
        (**self).repo_committers(owner, repo, past_year).await
    }

    async fn repo_issue_contributors(&self, owner: &str, repo: &str) -> Result<IssueContributors> {
        (**self).repo_issue_contributors(owner, repo).await
    }
}

#[async_trait]
impl<T: SponsorSource + ?Sized> SponsorSource for Arc<T> {
    async fn account_sponsorships(&self, login: &str) -> Result<SponsorshipData> {
        (**self).account_sponsorships(login).await
    }

    async fn account_sponsors(&self, login: &str) -> Result<SponsorshipData> {
        (**self).account_sponsors(login).await
    }

    async fn repo_funding(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        (**self).repo_funding(owner, repo).await
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Package>>;
    async fn transform(&self, packages: Vec<Package>) -> Result<Vec<PackageResult>>;
    async fn load(&self, results: Vec<PackageResult>) -> Result<String>;
}
