use crate::adapters::ecosystems::{EcosystemsClient, CRITICAL_MAX_PAGES};
use crate::adapters::github::GitHubClient;
use crate::adapters::http::{ApiClient, RetryPolicy};
use crate::app::packages::{apply_limit, parse_packages_file, resolve_sbom_packages};
use crate::app::report::{generate_report, print_summary, to_csv};
use crate::app::sbom::parse_sbom;
use crate::domain::model::{Package, PackageResult, SponsorshipData};
use crate::domain::ports::{ConfigProvider, PackageRegistry, Pipeline, Storage};
use crate::domain::services::{ContributionAnalyzer, SponsorshipChecker};
use crate::utils::error::Result;
use crate::utils::monitor::ProgressTracker;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Resolves candidate packages, attributes contributions, checks
/// sponsorship, then writes the report.
pub struct EngagementPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    ecosystems: Arc<EcosystemsClient>,
    github: Option<GitHubClient>,
}

impl<S: Storage, C: ConfigProvider> EngagementPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        Self::with_retry_policy(storage, config, RetryPolicy::default())
    }

    pub fn with_retry_policy(storage: S, config: C, policy: RetryPolicy) -> Result<Self> {
        let endpoints = config.endpoints();

        let github = match config.github_token().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!("🔑 GitHub token found, org members and GraphQL sponsorships enabled");
                Some(GitHubClient::new(
                    ApiClient::new(policy.clone())?,
                    endpoints.github_api_url.clone(),
                    token,
                ))
            }
            None => None,
        };

        let ecosystems = Arc::new(EcosystemsClient::new(ApiClient::new(policy)?, endpoints));

        Ok(Self {
            storage,
            config,
            ecosystems,
            github,
        })
    }

    /// Total upstream requests, retries included.
    pub fn request_count(&self) -> u64 {
        self.ecosystems.request_count() + self.github.as_ref().map_or(0, |g| g.request_count())
    }

    async fn org_members(&self, org: &str) -> HashSet<String> {
        let mut members = match self.ecosystems.org_maintainers(org).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!("⚠️ Could not fetch org maintainers for {}: {}", org, e);
                HashSet::new()
            }
        };

        if let Some(github) = &self.github {
            match github.org_members(org).await {
                Ok(extra) => members.extend(extra),
                Err(e) => tracing::warn!("⚠️ Could not fetch GitHub org members for {}: {}", org, e),
            }
        }

        members
    }

    async fn org_sponsorships(
        &self,
        checker: &SponsorshipChecker<Arc<EcosystemsClient>>,
        org: &str,
    ) -> SponsorshipData {
        let mut sponsorships = match checker.org_sponsorships(org).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("⚠️ Could not fetch sponsorships for {}: {}", org, e);
                SponsorshipData::default()
            }
        };

        if let Some(github) = &self.github {
            match github.org_sponsorships(org).await {
                Ok(extra) => sponsorships.merge(extra),
                Err(e) => tracing::warn!("⚠️ GitHub sponsorship query failed for {}: {}", org, e),
            }
        }

        sponsorships
    }

    async fn analyze_package(
        &self,
        analyzer: &ContributionAnalyzer<Arc<EcosystemsClient>>,
        checker: &SponsorshipChecker<Arc<EcosystemsClient>>,
        sponsorships: &SponsorshipData,
        package: Package,
    ) -> Result<PackageResult> {
        let contributors = analyzer
            .analyze_contributions(
                &package.owner,
                &package.repo,
                self.config.email_domain(),
                self.config.past_year_only(),
            )
            .await?;

        let sponsorship = checker
            .check_project_sponsorship(
                &package.owner,
                &package.repo,
                self.config.org_name(),
                sponsorships,
            )
            .await;

        Ok(PackageResult::new(package, contributors, sponsorship))
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for EngagementPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Package>> {
        let packages = if let Some(sbom_path) = self.config.sbom_file() {
            tracing::info!("📄 Reading SBOM from {}", sbom_path);
            let bytes = self.storage.read_file(sbom_path).await?;
            let entries = parse_sbom(&bytes)?;
            tracing::info!("Found {} packages in SBOM", entries.len());
            resolve_sbom_packages(self.ecosystems.as_ref(), &entries).await?
        } else if let Some(packages_path) = self.config.packages_file() {
            tracing::info!("📄 Reading packages from {}", packages_path);
            let bytes = self.storage.read_file(packages_path).await?;
            parse_packages_file(&bytes)?
        } else {
            tracing::info!("🌐 Fetching critical packages from ecosyste.ms");
            self.ecosystems.critical_packages(CRITICAL_MAX_PAGES).await?
        };

        Ok(apply_limit(packages, self.config.max_packages()))
    }

    async fn transform(&self, packages: Vec<Package>) -> Result<Vec<PackageResult>> {
        let org = self.config.org_name();

        let members = self.org_members(org).await;
        tracing::info!("👥 Found {} org members/maintainers", members.len());
        let analyzer = ContributionAnalyzer::with_members(Arc::clone(&self.ecosystems), org, &members);

        let checker = SponsorshipChecker::new(Arc::clone(&self.ecosystems));
        let sponsorships = self.org_sponsorships(&checker, org).await;
        tracing::info!(
            "💰 {} sponsors {} accounts ({} past)",
            org,
            sponsorships.current.len(),
            sponsorships.past.len()
        );

        let total = packages.len();
        let progress = ProgressTracker::new(total);
        let delay = self.config.request_delay();
        let mut results = Vec::with_capacity(total);

        for (i, package) in packages.into_iter().enumerate() {
            let label = package.full_name();
            tracing::debug!("[{}/{}] Analyzing {}", i + 1, total, label);

            match self
                .analyze_package(&analyzer, &checker, &sponsorships, package)
                .await
            {
                Ok(result) => {
                    if result.has_contributions() || result.has_active_sponsorship() {
                        tracing::info!(
                            "  {}: {} ({} contributors, {})",
                            label,
                            result.engagement_tier(),
                            result.unique_contributor_count,
                            result.sponsorship.status
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    tracing::error!("❌ Error analyzing {}: {}", label, e);
                }
            }

            let completed = i + 1;
            if progress.should_report(completed) {
                progress.log_progress(completed, self.request_count());
            }

            if completed < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!(
            "✅ Analyzed {} of {} packages ({} API requests)",
            results.len(),
            total,
            self.request_count()
        );
        Ok(results)
    }

    async fn load(&self, results: Vec<PackageResult>) -> Result<String> {
        let report = generate_report(
            results,
            self.config.org_name(),
            self.config.email_domain(),
            self.config.time_window_years(),
        );

        print_summary(&report)?;

        let output_path = self.config.output_file().to_string();
        let json = report.to_json_pretty()?;
        self.storage.write_file(&output_path, json.as_bytes()).await?;
        tracing::info!("📁 Report saved to {}", output_path);

        if self.config.output_formats().iter().any(|f| f == "csv") {
            let csv_path = csv_output_path(&output_path);
            let csv = to_csv(&report.detailed_results)?;
            self.storage.write_file(&csv_path, &csv).await?;
            tracing::info!("📁 CSV saved to {}", csv_path);
        }

        Ok(output_path)
    }
}

/// CSV table path next to the JSON report. A `.csv` report path gets a
/// `.results.csv` sibling so the JSON is never overwritten.
fn csv_output_path(output_path: &str) -> String {
    let path = Path::new(output_path);
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        path.with_extension("results.csv")
    } else {
        path.with_extension("csv")
    }
    .to_string_lossy()
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::ports::EndpointConfig;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    struct TestConfig {
        endpoints: EndpointConfig,
        packages_file: Option<String>,
        sbom_file: Option<String>,
        max_packages: Option<usize>,
        formats: Vec<String>,
        years: u32,
        token: Option<String>,
        output: String,
        delay: Duration,
    }

    impl TestConfig {
        fn new(server: &MockServer) -> Self {
            Self {
                endpoints: EndpointConfig {
                    packages_url: server.url("/packages"),
                    sponsors_url: server.url("/sponsors"),
                    repos_url: server.url("/repos"),
                    commits_url: server.url("/commits"),
                    issues_url: server.url("/issues"),
                    github_api_url: server.url("/github"),
                },
                packages_file: None,
                sbom_file: None,
                max_packages: None,
                formats: vec!["json".to_string()],
                years: 1,
                token: None,
                output: "out/report.json".to_string(),
                delay: Duration::ZERO,
            }
        }
    }

    impl ConfigProvider for TestConfig {
        fn org_name(&self) -> &str {
            "acme"
        }
        fn email_domain(&self) -> &str {
            "acme.com"
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
            self.sbom_file.as_deref()
        }
        fn request_delay(&self) -> Duration {
            self.delay
        }
        fn github_token(&self) -> Option<&str> {
            self.token.as_deref()
        }
        fn endpoints(&self) -> EndpointConfig {
            self.endpoints.clone()
        }
    }

    fn pipeline(dir: &TempDir, config: TestConfig) -> EngagementPipeline<LocalStorage, TestConfig> {
        EngagementPipeline::with_retry_policy(
            LocalStorage::new(dir.path()),
            config,
            RetryPolicy::immediate(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_prefers_packages_file_over_feed() {
        let server = MockServer::start();
        let feed = server.mock(|when, then| {
            when.method(GET).path("/packages/packages/critical");
            then.status(200).json_body(json!([]));
        });
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("packages.json"),
            r#"[{"owner": "a", "repo": "one"}, {"owner": "b", "repo": "two"}, {"owner": "c", "repo": "three"}]"#,
        )
        .unwrap();

        let mut config = TestConfig::new(&server);
        config.packages_file = Some("packages.json".to_string());
        config.max_packages = Some(2);

        let packages = pipeline(&dir, config).extract().await.unwrap();

        feed.assert_hits(0);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[1].full_name(), "b/two");
    }

    #[tokio::test]
    async fn test_extract_from_sbom() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/packages/packages/lookup")
                .query_param("purl", "pkg:npm/lodash@4.17.21");
            then.status(200).json_body(json!([{
                "name": "lodash",
                "ecosystem": "npm",
                "repository_url": "https://github.com/lodash/lodash",
                "dependent_repos_count": 3
            }]));
        });
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("bom.json"),
            json!({
                "bomFormat": "CycloneDX",
                "components": [{"name": "lodash", "purl": "pkg:npm/lodash@4.17.21"}]
            })
            .to_string(),
        )
        .unwrap();

        let mut config = TestConfig::new(&server);
        config.sbom_file = Some("bom.json".to_string());

        let packages = pipeline(&dir, config).extract().await.unwrap();

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].full_name(), "lodash/lodash");
        assert_eq!(packages[0].dependents_count, 3);
    }

    #[tokio::test]
    async fn test_transform_skips_failing_package_and_degrades_org_lookups() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/issues/hosts/GitHub/owners/acme");
            then.status(500);
        });
        server.mock(|when, then| {
            when.method(GET).path("/sponsors/accounts/acme/sponsorships");
            then.status(200).json_body(json!([
                {"maintainer": {"login": "good"}, "status": "active"}
            ]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/commits/hosts/GitHub/repositories/good/repo");
            then.status(200).json_body(json!({
                "committers": [],
                "past_year_committers": [{"email": "dev@acme.com", "login": "dev", "count": 4}]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/commits/hosts/GitHub/repositories/bad/repo");
            then.status(400);
        });
        server.mock(|when, then| {
            when.method(GET).path("/issues/hosts/GitHub/repositories/good/repo");
            then.status(404);
        });

        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir, TestConfig::new(&server));
        let packages = vec![
            Package {
                name: "bad".to_string(),
                ecosystem: "npm".to_string(),
                owner: "bad".to_string(),
                repo: "repo".to_string(),
                dependents_count: 0,
                repository_url: "https://github.com/bad/repo".to_string(),
            },
            Package {
                name: "good".to_string(),
                ecosystem: "npm".to_string(),
                owner: "good".to_string(),
                repo: "repo".to_string(),
                dependents_count: 0,
                repository_url: "https://github.com/good/repo".to_string(),
            },
        ];

        let results = pipeline.transform(packages).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].package.owner, "good");
        assert_eq!(results[0].contributors["dev@acme.com"].commits, 4);
        assert_eq!(
            results[0].engagement_tier(),
            crate::domain::model::EngagementTier::FullEngagement
        );
    }

    #[tokio::test]
    async fn test_load_writes_json_and_csv() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        let mut config = TestConfig::new(&server);
        config.formats = vec!["json".to_string(), "csv".to_string()];

        let path = pipeline(&dir, config).load(Vec::new()).await.unwrap();

        assert_eq!(path, "out/report.json");
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("out/report.json")).unwrap())
                .unwrap();
        assert_eq!(json["summary"]["organization"], "acme");
        assert!(dir.path().join("out/report.csv").exists());
    }

    #[tokio::test]
    async fn test_load_keeps_json_when_output_path_ends_in_csv() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        let mut config = TestConfig::new(&server);
        config.output = "report.csv".to_string();
        config.formats = vec!["json".to_string(), "csv".to_string()];

        let path = pipeline(&dir, config).load(Vec::new()).await.unwrap();

        assert_eq!(path, "report.csv");
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("report.csv")).unwrap())
                .unwrap();
        assert_eq!(json["summary"]["organization"], "acme");

        assert!(dir.path().join("report.results.csv").exists());
    }

    #[test]
    fn test_csv_output_path() {
        assert_eq!(csv_output_path("out/report.json"), "out/report.csv");
        assert_eq!(csv_output_path("report"), "report.csv");
        assert_eq!(csv_output_path("report.CSV"), "report.results.csv");
    }

    #[tokio::test]
    async fn test_transform_pauses_between_packages() {
        let server = MockServer::start();
        let dir = TempDir::new().unwrap();
        let mut config = TestConfig::new(&server);
        config.delay = Duration::from_millis(250);

        let packages: Vec<Package> = ["one", "two", "three"]
            .iter()
            .map(|repo| Package {
                name: repo.to_string(),
                ecosystem: "npm".to_string(),
                owner: "solo".to_string(),
                repo: repo.to_string(),
                dependents_count: 0,
                repository_url: format!("https://github.com/solo/{}", repo),
            })
            .collect();

        let started = std::time::Instant::now();
        let results = pipeline(&dir, config).transform(packages).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
